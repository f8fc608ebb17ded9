//! A minimal HTTP server handing out schema documents

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Serves fixed bodies by path on 127.0.0.1; unknown paths get a 404
pub struct SchemaServer {
    base: String,
    routes: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<AtomicUsize>,
}

impl SchemaServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind schema server");
        let base = format!("http://{}", listener.local_addr().expect("local addr"));
        let routes = Arc::new(Mutex::new(HashMap::new()));
        let requests = Arc::new(AtomicUsize::new(0));

        let served_routes = routes.clone();
        let served_requests = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                served_requests.fetch_add(1, Ordering::SeqCst);
                let routes = served_routes.clone();
                thread::spawn(move || respond(stream, &routes));
            }
        });

        Self {
            base,
            routes,
            requests,
        }
    }

    pub fn serve(&self, path: &str, body: impl Into<Vec<u8>>) -> String {
        self.routes
            .lock()
            .expect("routes lock")
            .insert(path.to_string(), body.into());
        self.url(path)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

fn respond(mut stream: TcpStream, routes: &Mutex<HashMap<String, Vec<u8>>>) {
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(stream) => stream,
        Err(_) => return,
    });

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => continue,
            Err(_) => return,
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    let body = routes.lock().ok().and_then(|routes| routes.get(&path).cloned());
    let (status, body) = match body {
        Some(body) => ("200 OK", body),
        None => ("404 Not Found", b"not found".to_vec()),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}
