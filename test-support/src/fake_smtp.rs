use log::debug;
use mailin_embedded::{Handler, Server, SslConfig};
use std::{
    net::{IpAddr, TcpListener},
    sync::Arc,
    thread,
};
use tokio::sync::{
    watch::{self, error::RecvError, Receiver, Sender},
    Mutex,
};

const SERVER_NAME: &str = "contact-form.test";

#[derive(Clone)]
struct SmtpHandler(Vec<u8>, Arc<Sender<String>>);

impl Handler for SmtpHandler {
    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        debug!("Got data:\n{}", String::from_utf8_lossy(buf));
        self.0.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let content = String::from_utf8_lossy(&self.0).into_owned();
        self.0.clear();
        let _ = self.1.send(content);
        mailin_embedded::response::OK
    }
}

/// A relay on an ephemeral local port which accepts every message. It offers neither TLS nor
/// authentication.
pub struct FakeSmtpServer {
    port: u16,
    receiver: Mutex<Receiver<String>>,
}

impl FakeSmtpServer {
    pub fn start() -> Self {
        let (sender, receiver) = watch::channel(String::new());
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut server = Server::new(SmtpHandler(Vec::new(), Arc::new(sender)));
        server
            .with_name(SERVER_NAME)
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_tcp_listener(listener);
        thread::spawn(move || {
            let _ = server.serve();
        });
        Self {
            port,
            receiver: Mutex::new(receiver),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Waits for the next message the relay receives and returns it as transmitted.
    pub async fn last_mail_content(&self) -> Result<String, RecvError> {
        let mut receiver = self.receiver.lock().await;
        receiver.changed().await?;
        let content = receiver.borrow_and_update().clone();
        Ok(content)
    }
}

#[derive(Clone)]
struct PoisonedSmtpHandler;

impl Handler for PoisonedSmtpHandler {
    fn helo(&mut self, _ip: IpAddr, _domain: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }
}

/// Starts a relay on an ephemeral local port which refuses every session and returns the port.
pub fn start_poisoned_smtp_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut server = Server::new(PoisonedSmtpHandler);
    server
        .with_name(SERVER_NAME)
        .with_ssl(SslConfig::None)
        .unwrap()
        .with_tcp_listener(listener);
    thread::spawn(move || {
        let _ = server.serve();
    });
    port
}
