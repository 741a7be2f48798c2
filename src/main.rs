/*
 *  main.rs
 *
 *  bigclock - synchronized clock faces
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use chrono::Local;
use env_logger::Env;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::BufReader;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use bigclock::bridge::{write_commands, Bridge};
use bigclock::config;
use bigclock::{CellRegistry, Clock, LifecycleManager, OffsetClock, Renderer, Scheduler, SystemClock};

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Waits for SIGINT, SIGTERM or SIGHUP and logs which one arrived.
#[cfg(unix)]
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT received. Initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received. Initiating graceful shutdown.");
        }
        _ = sighup.recv() => {
            info!("SIGHUP received. Initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn signal_handler() -> Result<(), Box<dyn std::error::Error>> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received. Initiating graceful shutdown.");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load()?;

    // stdout carries host commands, so logs go to stderr (env_logger default)
    env_logger::Builder::from_env(Env::default().default_filter_or(cfg.log_filter()))
        .format_timestamp_millis()
        .init();

    info!("{} v.{} built {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let clock: Arc<dyn Clock> = match cfg.start_time {
        Some(start) => {
            info!("clock pinned to start at {}", start);
            Arc::new(OffsetClock::starting_at(Local::now().date_naive().and_time(start)))
        }
        None => Arc::new(SystemClock),
    };

    let options = cfg.scheduler_options();
    info!(
        "blink policy {:?}, tick every {:?}, image encoding {:?}",
        options.blink_policy,
        options.blink_policy.tick_period(),
        cfg.encoding()
    );

    let registry = Arc::new(CellRegistry::new());
    let renderer = Arc::new(Renderer::new(cfg.encoding()));
    let scheduler = Scheduler::init(registry.clone(), renderer.clone(), clock.clone(), options);
    let lifecycle = LifecycleManager::new(registry, scheduler.clone(), renderer, clock)
        .with_settle_redraw(cfg.settle_redraw());

    let (mut bridge, commands) = Bridge::new(lifecycle);
    let writer = tokio::spawn(write_commands(commands, tokio::io::stdout()));

    tokio::select! {
        _ = signal_handler() => {
            // signal_handler logs the signal
        }
        result = bridge.run(BufReader::new(tokio::io::stdin())) => {
            match result {
                Ok(()) => info!("host closed the event stream"),
                Err(e) => error!("host event stream failed: {}", e),
            }
        }
    }

    scheduler.shutdown();
    drop(bridge);
    // registered handles keep the channel open, so give queued commands a moment then stop
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    writer.abort();
    match writer.await {
        Ok(Err(e)) => warn!("command writer failed: {}", e),
        Err(e) if !e.is_cancelled() => warn!("command writer panicked: {}", e),
        _ => {}
    }

    info!("bigclock stopped");
    Ok(())
}
