use log::debug;
use mailin_embedded::{Handler, Server, SslConfig};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

const NEXT_MAIL_TIMEOUT: Duration = Duration::from_secs(5);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct DeliveredMail {
    pub to: Vec<String>,
    pub data: String,
}

impl DeliveredMail {
    pub fn subject(&self) -> Option<String> {
        static SUBJECT: OnceLock<Regex> = OnceLock::new();
        SUBJECT
            .get_or_init(|| Regex::new(r"(?m)^Subject: (.+?)\r?$").unwrap())
            .captures(&self.data)
            .map(|captures| captures[1].to_string())
    }

    pub fn otp_code(&self) -> Option<String> {
        static CODE: OnceLock<Regex> = OnceLock::new();
        CODE.get_or_init(|| Regex::new(r"Your OTP is: (\d{6})").unwrap())
            .captures(&self.data)
            .map(|captures| captures[1].to_string())
    }

    pub fn addressed_to(&self, address: &str) -> bool {
        self.to.iter().any(|to| to.contains(address))
    }
}

#[derive(Clone)]
struct CapturingHandler {
    buffer: Vec<u8>,
    recipients: Vec<String>,
    rejected: Vec<String>,
    sender: UnboundedSender<DeliveredMail>,
}

impl Handler for CapturingHandler {
    fn rcpt(&mut self, to: &str) -> mailin_embedded::Response {
        if self
            .rejected
            .iter()
            .any(|rejected| to.contains(rejected.as_str()))
        {
            return mailin_embedded::response::INTERNAL_ERROR;
        }
        mailin_embedded::response::OK
    }

    fn data_start(
        &mut self,
        _domain: &str,
        _from: &str,
        _is8bit: bool,
        to: &[String],
    ) -> mailin_embedded::Response {
        self.recipients = to.to_vec();
        self.buffer.clear();
        mailin_embedded::response::OK
    }

    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.buffer.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let mail = DeliveredMail {
            to: std::mem::take(&mut self.recipients),
            data: String::from_utf8_lossy(&self.buffer).into_owned(),
        };
        debug!("Fake SMTP captured mail to {:?}", mail.to);
        self.buffer.clear();
        let _ = self.sender.send(mail);
        mailin_embedded::response::OK
    }

    fn auth_plain(
        &mut self,
        _authorization_id: &str,
        _authentication_id: &str,
        _password: &str,
    ) -> mailin_embedded::Response {
        mailin_embedded::response::AUTH_OK
    }
}

/// Embedded SMTP sink capturing every delivery for assertions.
pub struct FakeSmtpServer {
    receiver: tokio::sync::Mutex<UnboundedReceiver<DeliveredMail>>,
}

impl FakeSmtpServer {
    /// Binds an ephemeral port, points SMTP_URL at it, and accepts every
    /// delivery.
    pub fn start() -> Self {
        Self::start_with_rejections(&[])
    }

    /// As [`FakeSmtpServer::start`], but refuses delivery to the given
    /// addresses.
    pub fn start_with_rejections(addresses: &[&str]) -> Self {
        let (sender, receiver) = unbounded_channel();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::env::set_var("SMTP_URL", format!("smtp://{addr}"));
        let handler = CapturingHandler {
            buffer: Vec::new(),
            recipients: Vec::new(),
            rejected: addresses.iter().map(|address| address.to_string()).collect(),
            sender,
        };
        let mut server = Server::new(handler);
        server
            .with_name("portfolio.test")
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_tcp_listener(listener);
        std::thread::spawn(move || {
            let _ = server.serve();
        });
        Self {
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    /// The next captured delivery, or None when nothing arrives in time.
    pub async fn next_mail(&self) -> Option<DeliveredMail> {
        let mut receiver = self.receiver.lock().await;
        timeout(NEXT_MAIL_TIMEOUT, receiver.recv()).await.ok().flatten()
    }

    /// True when no further delivery arrives within a short quiet period.
    pub async fn no_further_mail(&self) -> bool {
        let mut receiver = self.receiver.lock().await;
        timeout(QUIET_PERIOD, receiver.recv()).await.is_err()
    }
}
