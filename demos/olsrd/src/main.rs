mod config;
mod system;

use std::cell::RefCell;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use log::{debug, info, warn};
use olsr::framework::Environment;
use olsr::router::Router;
use rand::rngs::StdRng;
use rand::SeedableRng;
use simplelog::*;
use tokio::fs;
use tokio::net::UdpSocket;
use tokio::time::Instant;

use crate::config::DaemonConfig;
use crate::system::{
    ConfiguredInterfaces, Ipv4System, LogSink, Outbox, SharedTimers, TimerWheel, WallClock,
};

/// how long to sleep when no timer is pending
const IDLE: Duration = Duration::from_secs(1);

async fn load_config(path: &str) -> anyhow::Result<DaemonConfig> {
    let file = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config {path}"))?;
    let config: DaemonConfig =
        serde_json::from_str(&file).with_context(|| format!("failed to parse config {path}"))?;
    if config.interfaces.is_empty() {
        return Err(anyhow!("no interfaces configured"));
    }
    Ok(config)
}

async fn flush(
    socket: &UdpSocket,
    config: &DaemonConfig,
    outbox: &Rc<RefCell<Vec<(String, bytes::Bytes)>>>,
) {
    let pending = std::mem::take(&mut *outbox.borrow_mut());
    for (name, packet) in pending {
        let Some(interface) = config.interfaces.iter().find(|i| i.name == name) else {
            warn!("no interface named {name}");
            continue;
        };
        let target = SocketAddrV4::new(interface.broadcast(), config.port);
        if let Err(err) = socket.send_to(&packet, target).await {
            warn!("failed to send on {name}: {err}");
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])?;

    let path = std::env::args().nth(1).unwrap_or_else(|| "./olsrd.json".to_string());
    let config = load_config(&path).await?;
    let main_address = config
        .main_address()
        .ok_or_else(|| anyhow!("cannot determine a main address"))?;

    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    socket.set_broadcast(true)?;

    let start = Instant::now();
    let wheel = Rc::new(RefCell::new(TimerWheel::default()));
    let outbox = Rc::new(RefCell::new(Vec::new()));
    let env = Environment {
        clock: Box::new(WallClock { start }),
        timers: Box::new(SharedTimers {
            clock: start,
            wheel: wheel.clone(),
        }),
        sender: Box::new(Outbox(outbox.clone())),
        interfaces: Box::new(ConfiguredInterfaces(config.clone())),
        sink: Box::new(LogSink),
        rng: Box::new(StdRng::from_entropy()),
    };
    let mut router = Router::<Ipv4System>::with_params(main_address, config.params.clone(), env);
    router.start();
    info!("olsrd running as {main_address} on port {}", config.port);

    let mut buf = vec![0u8; 65536];
    loop {
        let sleep_for = wheel
            .borrow()
            .next_deadline()
            .map(|at| at.saturating_sub(start.elapsed()))
            .unwrap_or(IDLE);

        tokio::select! {
            received = socket.recv_from(&mut buf) => {
                let (len, from) = received?;
                let SocketAddr::V4(from) = from else {
                    continue;
                };
                let sender = *from.ip();
                if router.is_local_address(&sender) {
                    continue;
                }
                let Some(interface) = config.interface_for(sender) else {
                    debug!("dropping packet from {sender}, not on any OLSR interface");
                    continue;
                };
                if let Err(err) = router.handle_packet(&interface.name, &sender, &buf[..len]) {
                    warn!("bad packet from {sender}: {err}");
                }
            }
            _ = tokio::time::sleep(sleep_for) => {
                let now = start.elapsed();
                loop {
                    let due = wheel.borrow_mut().pop_due(now);
                    let Some(timer) = due else {
                        break;
                    };
                    router.handle_timer(timer);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                if let Ok(json) = router.snapshot().to_json() {
                    debug!("final state: {json}");
                }
                router.stop();
                break;
            }
        }
        flush(&socket, &config, &outbox).await;
    }
    Ok(())
}
