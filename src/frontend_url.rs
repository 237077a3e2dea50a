use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::{
    net::UdpSocket,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::debug;

pub const DETECTED_URL_TTL: Duration = Duration::from_secs(30);

/// Resolves the base URL printed into table QR codes.
///
/// An explicitly configured URL is returned verbatim. Without one, the
/// host's LAN address is detected and combined with the frontend port, so
/// phones on the restaurant Wi-Fi can reach the menu after a DHCP change.
#[derive(Debug)]
pub struct FrontendUrl {
    explicit: Option<String>,
    port: u16,
    cache: Mutex<Option<CachedUrl>>,
}

#[derive(Debug, Clone)]
struct CachedUrl {
    url: String,
    resolved_at: Instant,
}

impl FrontendUrl {
    pub fn new(explicit: Option<String>, port: u16) -> Self {
        let explicit = explicit
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self {
            explicit,
            port,
            cache: Mutex::new(None),
        }
    }

    pub async fn resolve(&self) -> String {
        if let Some(url) = &self.explicit {
            return url.clone();
        }

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache
            .as_ref()
            .filter(|c| c.resolved_at.elapsed() < DETECTED_URL_TTL)
        {
            return cached.url.clone();
        }

        let ip = detect_lan_ip()
            .await
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let url = format!("http://{ip}:{}", self.port);
        debug!(url = %url, "frontend url detected");
        *cache = Some(CachedUrl {
            url: url.clone(),
            resolved_at: Instant::now(),
        });
        url
    }
}

/// Connecting a UDP socket sends nothing; it only makes the kernel pick the
/// outbound interface, whose address we then read back.
async fn detect_lan_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        .await
        .ok()?;
    socket
        .connect(SocketAddr::from((Ipv4Addr::new(8, 8, 8, 8), 53)))
        .await
        .ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_loopback() || ip.is_unspecified() {
        return None;
    }
    Some(ip)
}
