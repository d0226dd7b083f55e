use log::debug;
use mailin_embedded::{Handler, Server, SslConfig};
use std::{
    net::IpAddr,
    sync::{Arc, Once},
    time::Duration,
};
use tokio::{
    sync::watch::{self, error::RecvError, Receiver, Sender},
    time::timeout,
};

pub const SMTP_PORT: u16 = 4567;
pub const POISONED_SMTP_PORT: u16 = 4568;

const SERVER_NAME: &str = "contact-form.test";

#[derive(Clone)]
struct RecordingSmtpHandler {
    buffer: Vec<u8>,
    mail_sender: Arc<Sender<String>>,
}

impl Handler for RecordingSmtpHandler {
    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buffer.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let content = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        debug!("Received mail:\n{content}");
        let _ = self.mail_sender.send(content);
        mailin_embedded::response::OK
    }

    fn auth_plain(
        &mut self,
        _authorization_id: &str,
        authentication_id: &str,
        _password: &str,
    ) -> mailin_embedded::Response {
        debug!("Accepted credentials of {authentication_id}");
        mailin_embedded::response::AUTH_OK
    }
}

/// Plain-text SMTP server on [`SMTP_PORT`] which exposes the most recently received mail.
///
/// The port is fixed, so tests sharing one instance must run serially.
pub struct FakeSmtpServer {
    server: std::sync::Mutex<Option<Server<RecordingSmtpHandler>>>,
    mail_receiver: tokio::sync::Mutex<Receiver<String>>,
}

impl FakeSmtpServer {
    pub fn new() -> Self {
        let (mail_sender, mail_receiver) = watch::channel(String::new());
        let handler = RecordingSmtpHandler {
            buffer: Vec::new(),
            mail_sender: Arc::new(mail_sender),
        };
        Self {
            server: std::sync::Mutex::new(Some(configure_server(handler, SMTP_PORT))),
            mail_receiver: tokio::sync::Mutex::new(mail_receiver),
        }
    }

    /// Starts listening on a background thread. Later calls do nothing.
    pub fn start(&self) {
        if let Some(server) = self.server.lock().unwrap().take() {
            std::thread::spawn(move || {
                let _ = server.serve();
            });
        }
    }

    pub async fn last_mail_content(&self) -> Result<String, RecvError> {
        let mut receiver = self.mail_receiver.lock().await;
        receiver.changed().await?;
        let content = receiver.borrow_and_update().clone();
        Ok(content)
    }

    /// Discards a mail left over from an earlier test.
    pub async fn flush(&self) {
        let mut receiver = self.mail_receiver.lock().await;
        let _ = timeout(Duration::from_millis(100), receiver.changed()).await;
        receiver.borrow_and_update();
    }

    pub fn url() -> String {
        format!("smtp://127.0.0.1:{SMTP_PORT}")
    }
}

impl Default for FakeSmtpServer {
    fn default() -> Self {
        Self::new()
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

/// Starts an SMTP server on [`POISONED_SMTP_PORT`] which rejects every session.
pub fn start_poisoned_smtp_server() {
    static STARTED: Once = Once::new();
    STARTED.call_once(|| {
        let server = configure_server(PoisonedSmtpHandler, POISONED_SMTP_PORT);
        std::thread::spawn(move || {
            let _ = server.serve();
        });
    });
}

pub fn poisoned_url() -> String {
    format!("smtp://127.0.0.1:{POISONED_SMTP_PORT}")
}

fn configure_server<HandlerT: Handler + Clone + Send + 'static>(
    handler: HandlerT,
    port: u16,
) -> Server<HandlerT> {
    let mut server = Server::new(handler);
    server
        .with_name(SERVER_NAME)
        .with_ssl(SslConfig::None)
        .unwrap()
        .with_addr(format!("127.0.0.1:{port}"))
        .unwrap();
    server
}
