use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread;

use lazy_static::lazy_static;
use prometheus::{Encoder, Registry, TextEncoder};
use tracing::{debug, warn};

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
}

/// Register this pipeline's counters and spawn a background thread serving `GET /metrics` on
/// `addr` (spec.md §4.5: "pod spec advertises a metrics port"). The worker pod has no
/// certificate-issuance machinery of its own, so unlike the controller-facing surfaces this
/// listens over plain HTTP; it is only ever reached inside the pod network, not across the
/// cluster boundary.
///
/// # Errors
///
/// Returns `Err` if the counters are already registered or the listener fails to bind.
pub fn serve(addr: &str) -> anyhow::Result<()> {
    crate::counting::register(&REGISTRY)?;
    let listener = TcpListener::bind(addr)?;
    debug!("metrics listening on {addr}");
    let _handle = thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => handle(stream),
                Err(err) => warn!("metrics connection failed: {err}"),
            }
        }
    });
    Ok(())
}

fn handle(mut stream: TcpStream) {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut body = Vec::new();
    if let Err(err) = encoder.encode(&families, &mut body) {
        warn!("failed to encode metrics: {err}");
        return;
    }
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n",
        encoder.format_type(),
        body.len()
    );
    if let Err(err) = stream.write_all(response.as_bytes()).and_then(|()| stream.write_all(&body)) {
        warn!("failed to write metrics response: {err}");
    }
}
