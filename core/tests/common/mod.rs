//! Shared setup for tests that talk to the live mock server.

#![allow(dead_code)]

use std::sync::mpsc::Receiver;
use std::time::Duration;

use courier_core::{Endpoint, Session, SessionConfig};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Start the mock server on a random port and return its base URL.
pub fn spawn_server() -> String {
    let _ = env_logger::builder().is_test(true).try_init();

    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
    });

    format!("http://{addr}")
}

pub struct Server {
    pub base: String,
}

impl Server {
    pub fn start() -> Self {
        Self { base: spawn_server() }
    }

    pub fn endpoint(&self, path: &str) -> Endpoint {
        Endpoint::new(&format!("{}{path}", self.base)).unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

pub fn deferred_session() -> Session {
    Session::with_config(SessionConfig {
        start_requests_immediately: false,
        ..SessionConfig::default()
    })
}

pub fn wait<T>(rx: &Receiver<T>) -> T {
    rx.recv_timeout(TIMEOUT).expect("request did not complete in time")
}
