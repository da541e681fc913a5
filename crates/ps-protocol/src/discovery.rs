//! Listening-port discovery for companion bridge processes.
//!
//! Candidates are probed concurrently on a bounded rayon pool. Each probe
//! owns one result slot; the caller only reads the slots after the pool has
//! joined, so the selected port is always the first open one in candidate
//! order regardless of which probe finished first.

use std::net::{IpAddr, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, warn};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// True if something accepts TCP connections at `addr` within `timeout`.
pub fn is_listening(addr: SocketAddr, timeout: Duration) -> bool {
    TcpStream::connect_timeout(&addr, timeout).is_ok()
}

/// First candidate port on `host` that accepts a connection.
pub fn probe_ports(
    host: IpAddr,
    candidates: &[u16],
    timeout: Duration,
    max_workers: usize,
) -> Option<u16> {
    if candidates.is_empty() {
        return None;
    }

    let workers = max_workers.clamp(1, candidates.len());
    let probe = |port: &u16| is_listening(SocketAddr::new(host, *port), timeout);

    let slots: Vec<bool> = match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("port-probe-{i}"))
        .build()
    {
        Ok(pool) => pool.install(|| candidates.par_iter().map(probe).collect()),
        Err(e) => {
            warn!(error = %e, "probe pool unavailable, probing sequentially");
            candidates.iter().map(probe).collect()
        }
    };

    let found = candidates
        .iter()
        .zip(slots)
        .find_map(|(port, open)| open.then_some(*port));
    debug!(%host, ?candidates, ?found, "port probe finished");
    found
}

/// Poll [`probe_ports`] until a port opens or `deadline` elapses.
pub fn wait_for_port(
    host: IpAddr,
    candidates: &[u16],
    timeout: Duration,
    deadline: Duration,
    poll: Duration,
) -> Option<u16> {
    let started = Instant::now();
    loop {
        if let Some(port) = probe_ports(host, candidates, timeout, DEFAULT_MAX_WORKERS) {
            return Some(port);
        }
        if started.elapsed() >= deadline {
            warn!(%host, ?candidates, "no listening port before deadline");
            return None;
        }
        thread::sleep(poll);
    }
}
