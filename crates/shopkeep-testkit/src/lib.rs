// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use shopkeep_app::{Product, ProductId, RATING_MAX, RATING_MIN};
use std::io::Read;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server};

const PRODUCT_STATUSES: [&str; 8] = [
    "active",
    "inactive",
    "pending",
    "backordered",
    "discontinued",
    "preorder",
    "clearance",
    "seasonal",
];

pub const COLLECTION_PATH: &str = "/products";

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

#[derive(Debug, Clone)]
pub struct ProductFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl ProductFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 1,
        }
    }

    pub fn product(&mut self) -> Product {
        let id = self.next_id;
        self.next_id += 1;
        Product {
            id: ProductId::new(id),
            external_id: self.int_range_i64(100, 99_999),
            rating: self.int_range_i64(RATING_MIN, RATING_MAX),
            status: self.pick(&PRODUCT_STATUSES).to_owned(),
        }
    }

    pub fn collection(&mut self, count: usize) -> Vec<Product> {
        (0..count).map(|_| self.product()).collect()
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range_i64(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }
}

pub fn product_statuses() -> &'static [&'static str] {
    &PRODUCT_STATUSES
}

// In-process collection service speaking the remote store's wire protocol
// over a plain vector. Backs integration tests and demo mode.
pub struct CollectionServer {
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
    products: Arc<Mutex<Vec<Product>>>,
    base_url: String,
}

impl CollectionServer {
    pub fn start(seed: Vec<Product>) -> Result<Self> {
        let server = Arc::new(
            Server::http("127.0.0.1:0")
                .map_err(|error| anyhow!("start collection server: {error}"))?,
        );
        let base_url = format!("http://{}{COLLECTION_PATH}", server.server_addr());
        let products = Arc::new(Mutex::new(seed));

        let handle = thread::spawn({
            let server = Arc::clone(&server);
            let products = Arc::clone(&products);
            move || serve(&server, &products)
        });

        Ok(Self {
            server,
            handle: Some(handle),
            products,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn products(&self) -> Vec<Product> {
        lock_products(&self.products).clone()
    }
}

impl Drop for CollectionServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(server: &Server, products: &Mutex<Vec<Product>>) {
    while let Ok(mut request) = server.recv() {
        let response = handle_request(&mut request, products);
        let _ = request.respond(response);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestPath {
    Collection,
    Item(i64),
    Unknown,
}

fn parse_path(url: &str) -> RequestPath {
    let path = url.split('?').next().unwrap_or(url);
    if path == COLLECTION_PATH {
        return RequestPath::Collection;
    }
    if let Some(rest) = path.strip_prefix(COLLECTION_PATH)
        && let Some(raw_id) = rest.strip_prefix('/')
        && let Ok(id) = raw_id.parse()
    {
        return RequestPath::Item(id);
    }
    RequestPath::Unknown
}

fn handle_request(
    request: &mut Request,
    products: &Mutex<Vec<Product>>,
) -> Response<std::io::Cursor<Vec<u8>>> {
    let url = request.url().to_owned();
    let method = request.method().clone();

    match (method, parse_path(&url)) {
        (Method::Get, RequestPath::Collection) => {
            let body = match serde_json::to_string(&*lock_products(products)) {
                Ok(body) => body,
                Err(_) => return json_response(500, "{}"),
            };
            json_response(200, &body)
        }
        (Method::Post, RequestPath::Collection) => match read_product(request) {
            Some(product) => {
                let body = serde_json::to_string(&product).unwrap_or_else(|_| "{}".to_owned());
                lock_products(products).push(product);
                json_response(201, &body)
            }
            None => json_response(400, "{}"),
        },
        (Method::Put, RequestPath::Item(id)) => match read_product(request) {
            Some(product) => {
                let mut guard = lock_products(products);
                match guard.iter_mut().find(|entry| entry.id.get() == id) {
                    Some(entry) => {
                        *entry = product;
                        let body =
                            serde_json::to_string(entry).unwrap_or_else(|_| "{}".to_owned());
                        json_response(200, &body)
                    }
                    None => json_response(404, "{}"),
                }
            }
            None => json_response(400, "{}"),
        },
        (Method::Delete, RequestPath::Item(id)) => {
            let mut guard = lock_products(products);
            let before = guard.len();
            guard.retain(|entry| entry.id.get() != id);
            if guard.len() == before {
                json_response(404, "{}")
            } else {
                json_response(200, "{}")
            }
        }
        _ => json_response(404, "{}"),
    }
}

fn read_product(request: &mut Request) -> Option<Product> {
    let mut body = String::new();
    request.as_reader().read_to_string(&mut body).ok()?;
    serde_json::from_str(&body).ok()
}

fn json_response(status: u16, body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body).with_status_code(status).with_header(
        Header::from_bytes("Content-Type", "application/json")
            .expect("valid content type header"),
    )
}

fn lock_products(products: &Mutex<Vec<Product>>) -> MutexGuard<'_, Vec<Product>> {
    match products.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
