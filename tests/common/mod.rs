#![allow(dead_code)]

pub mod http_client {
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;

    #[derive(Debug)]
    pub struct HttpResponse {
        pub status: u16,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl HttpResponse {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).to_string()
        }
    }

    /// One client connection that can send several (pipelined) requests.
    pub struct Connection {
        stream: TcpStream,
        buf: Vec<u8>,
    }

    impl Connection {
        pub fn open(port: u16) -> Self {
            let stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            Self {
                stream,
                buf: Vec::new(),
            }
        }

        pub fn send(&mut self, raw: &[u8]) {
            self.stream.write_all(raw).unwrap();
        }

        /// Read one response framed by `Content-Length`.
        pub fn read_response(&mut self) -> HttpResponse {
            let head_end = loop {
                if let Some(pos) = find(&self.buf, b"\r\n\r\n") {
                    break pos;
                }
                self.fill();
            };
            let head = String::from_utf8_lossy(&self.buf[..head_end]).to_string();
            let mut lines = head.split("\r\n");
            let status = lines
                .next()
                .and_then(|l| l.split_whitespace().nth(1))
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let headers: Vec<(String, String)> = lines
                .filter_map(|l| l.split_once(':'))
                .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
                .collect();
            let length = headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.parse::<usize>().ok())
                .unwrap_or(0);

            let start = head_end + 4;
            while self.buf.len() < start + length {
                self.fill();
            }
            let body = self.buf[start..start + length].to_vec();
            self.buf.drain(..start + length);
            HttpResponse {
                status,
                headers,
                body,
            }
        }

        fn fill(&mut self) {
            let mut tmp = [0u8; 4096];
            let n = self.stream.read(&mut tmp).unwrap();
            assert!(n > 0, "connection closed mid-response");
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    pub fn request_bytes(method: &str, target: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
        let mut raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n");
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        raw.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
        let mut raw = raw.into_bytes();
        raw.extend_from_slice(body);
        raw
    }

    pub fn send(port: u16, method: &str, target: &str, headers: &[(&str, &str)], body: &[u8]) -> HttpResponse {
        let mut conn = Connection::open(port);
        conn.send(&request_bytes(method, target, headers, body));
        conn.read_response()
    }

    pub fn get(port: u16, target: &str) -> HttpResponse {
        send(port, "GET", target, &[], b"")
    }

    /// `(name, file name, bytes)` triples encoded as `multipart/form-data`.
    pub fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, bytes) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match file_name {
                Some(file) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }
}

pub mod test_server {
    use routeport::server::{MiniHttpAdapter, ReactiveAdapter, ServerPort, ThreadedAdapter};
    use routeport::ServerSettings;

    /// Ephemeral port, small pools and a coroutine stack roomy enough for
    /// multipart parsing with logging enabled.
    pub fn settings() -> ServerSettings {
        ServerSettings {
            port: 0,
            workers: 2,
            stack_size: 0x10000,
            shutdown_timeout_ms: 1_000,
            ..ServerSettings::default()
        }
    }

    pub fn adapters() -> Vec<Box<dyn ServerPort>> {
        vec![
            Box::new(MiniHttpAdapter::new()),
            Box::new(ThreadedAdapter::new()),
            Box::new(ReactiveAdapter::new()),
        ]
    }
}
