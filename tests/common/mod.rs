//! Common test utilities and helpers for the kitchen_capture tests
//!
//! Mock camera devices that count live tracks, image fixtures, and a minimal
//! HTTP stub server for the panel backends.

#![allow(dead_code)]

/// Mock camera that records every track it opens and stops
pub mod mock_devices {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use kitchen_capture::capture::{
        DeviceFailure, Frame, FrameSize, MediaConstraints, MediaDevices, MediaStream,
    };
    use tokio::sync::Notify;

    /// Shared counters, observable after the devices were moved into an acquisition
    #[derive(Debug, Default)]
    pub struct TrackCounters {
        pub opened: AtomicUsize,
        pub stopped: AtomicUsize,
    }

    impl TrackCounters {
        pub fn live(&self) -> usize {
            self.opened.load(Ordering::SeqCst) - self.stopped.load(Ordering::SeqCst)
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn stopped(&self) -> usize {
            self.stopped.load(Ordering::SeqCst)
        }
    }

    /// Configurable mock camera
    #[derive(Default)]
    pub struct MockDevices {
        pub counters: Arc<TrackCounters>,
        /// Reject every open with this failure
        pub fail_open: Option<DeviceFailure>,
        /// Never answer the permission request
        pub hang_open: bool,
        /// Hold `ready` until this is notified
        pub ready_gate: Option<Arc<Notify>>,
        /// Deliver frames whose buffer does not match their size
        pub corrupt_frames: bool,
        /// Fail every snapshot as an unplugged camera would
        pub fail_snapshot: bool,
        /// Largest frame the camera can produce
        pub max_size: Option<FrameSize>,
    }

    impl MockDevices {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing(failure: DeviceFailure) -> Self {
            Self {
                fail_open: Some(failure),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl MediaDevices for MockDevices {
        async fn open(
            &self,
            constraints: &MediaConstraints,
        ) -> Result<Box<dyn MediaStream>, DeviceFailure> {
            if self.hang_open {
                std::future::pending::<()>().await;
            }
            if let Some(failure) = &self.fail_open {
                return Err(failure.clone());
            }

            let requested = FrameSize {
                width: constraints.resolution.width,
                height: constraints.resolution.height,
            };
            let size = match self.max_size {
                Some(max) if requested.width > max.width || requested.height > max.height => {
                    if constraints.resolution.exact {
                        return Err(DeviceFailure::Overconstrained("width".into()));
                    }
                    max
                }
                _ => requested,
            };

            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockStream {
                size,
                counters: Arc::clone(&self.counters),
                ready_gate: self.ready_gate.clone(),
                corrupt_frames: self.corrupt_frames,
                fail_snapshot: self.fail_snapshot,
                live: true,
            }))
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct MockStream {
        size: FrameSize,
        counters: Arc<TrackCounters>,
        ready_gate: Option<Arc<Notify>>,
        corrupt_frames: bool,
        fail_snapshot: bool,
        live: bool,
    }

    #[async_trait]
    impl MediaStream for MockStream {
        async fn ready(&mut self) -> Result<FrameSize, DeviceFailure> {
            if let Some(gate) = &self.ready_gate {
                gate.notified().await;
            }
            Ok(self.size)
        }

        fn snapshot(&mut self) -> Result<Frame, DeviceFailure> {
            if self.fail_snapshot {
                return Err(DeviceFailure::Other("device disconnected".into()));
            }
            let len = if self.corrupt_frames {
                7
            } else {
                (self.size.width * self.size.height * 4) as usize
            };
            Ok(Frame {
                width: self.size.width,
                height: self.size.height,
                data: Arc::new(vec![128; len]),
            })
        }

        fn stop(&mut self) {
            if self.live {
                self.live = false;
                self.counters.stopped.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn active_tracks(&self) -> usize {
            usize::from(self.live)
        }
    }

    impl Drop for MockStream {
        fn drop(&mut self) {
            self.stop();
        }
    }
}

/// Image fixtures
pub mod fixtures {
    use std::sync::Arc;

    use kitchen_capture::capture::Frame;
    use kitchen_capture::processing::frame_to_jpeg;
    use kitchen_capture::{CapturedImage, ImageSource};

    /// Encoded JPEG of a flat grey image
    pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let frame = Frame {
            width,
            height,
            data: Arc::new([120u8, 140, 160, 255].repeat((width * height) as usize)),
        };
        frame_to_jpeg(&frame, 80).expect("encode fixture")
    }

    /// Small JPEG wrapped as a file pick
    pub fn jpeg_image(width: u32, height: u32) -> CapturedImage {
        CapturedImage::from_bytes(&jpeg_bytes(width, height), "image/jpeg", ImageSource::FilePick, None)
    }
}

/// Minimal HTTP/1.1 stub server
pub mod stub_server {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// One request as received
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub method: String,
        pub path: String,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl RecordedRequest {
        pub fn header(&self, name: &str) -> Option<&str> {
            self.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        }

        pub fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }

        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.body).expect("request body is JSON")
        }
    }

    /// Server answering each request with the next canned `(status, body)`.
    /// The last response repeats once the list is exhausted.
    pub struct StubServer {
        pub base_url: String,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl StubServer {
        pub async fn start(responses: Vec<(u16, String)>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
            let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
            let requests = Arc::new(Mutex::new(Vec::new()));

            let recorded = Arc::clone(&requests);
            tokio::spawn(async move {
                let mut served = 0usize;
                while let Ok((stream, _)) = listener.accept().await {
                    let (status, body) = responses
                        .get(served)
                        .or_else(|| responses.last())
                        .cloned()
                        .unwrap_or((404, String::new()));
                    served += 1;
                    handle(stream, status, &body, &recorded).await;
                }
            });

            Self { base_url, requests }
        }

        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().expect("lock").clone()
        }
    }

    async fn handle(
        mut stream: TcpStream,
        status: u16,
        body: &str,
        recorded: &Mutex<Vec<RecordedRequest>>,
    ) -> Option<()> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let path = request_line.next()?.to_string();
        let headers: Vec<(String, String)> = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse::<usize>().ok());
        let chunked = headers.iter().any(|(k, v)| {
            k.eq_ignore_ascii_case("transfer-encoding") && v.eq_ignore_ascii_case("chunked")
        });

        let mut raw_body = buf[header_end..].to_vec();
        if let Some(len) = content_length {
            while raw_body.len() < len {
                let n = stream.read(&mut chunk).await.ok()?;
                if n == 0 {
                    break;
                }
                raw_body.extend_from_slice(&chunk[..n]);
            }
        } else if chunked {
            while !raw_body.ends_with(b"0\r\n\r\n") {
                let n = stream.read(&mut chunk).await.ok()?;
                if n == 0 {
                    break;
                }
                raw_body.extend_from_slice(&chunk[..n]);
            }
            raw_body = dechunk(&raw_body);
        }

        recorded.lock().expect("lock").push(RecordedRequest {
            method,
            path,
            headers,
            body: raw_body,
        });

        let response = format!(
            "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.ok()?;
        let _ = stream.shutdown().await;
        Some(())
    }

    fn dechunk(raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut rest = raw;
        while let Some(pos) = rest.windows(2).position(|w| w == b"\r\n") {
            let size_line = String::from_utf8_lossy(&rest[..pos]);
            let Ok(size) = usize::from_str_radix(size_line.trim(), 16) else {
                break;
            };
            if size == 0 {
                break;
            }
            let start = pos + 2;
            let end = (start + size).min(rest.len());
            out.extend_from_slice(&rest[start..end]);
            rest = &rest[(end + 2).min(rest.len())..];
        }
        out
    }

    /// Chat-completion reply carrying `content`
    pub fn chat_reply(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }
}
