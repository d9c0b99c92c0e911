/*
 * This file is part of ferrokv.
 *
 * ferrokv is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ferrokv is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with ferrokv. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! Process entry point (§6, SPEC_FULL §F): loads config from an optional
//! positional YAML path, runs recovery, then the server loop until
//! `Ctrl+C`/`SIGTERM`.

use ferrokv::config::Config;
use ferrokv::keyspace::Keyspace;
use ferrokv::persistence::{self, PersistenceManager};
use ferrokv::pubsub::PubSubRouter;
use ferrokv::server::Server;

use std::env;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

static RUNNING: AtomicBool = AtomicBool::new(true);

#[cfg(unix)]
extern "C" fn handle_shutdown_signal(_sig: libc::c_int) {
    RUNNING.store(false, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_shutdown_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_shutdown_signal as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {
    // Ctrl+C is still delivered as SIGINT-equivalent process termination on
    // non-Unix targets by the runtime; nothing to wire up by hand here.
}

fn main() {
    env_logger::Builder::new()
        .parse_filters(&env::var("FERROKV_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();

    let config_path = env::args().nth(1);
    let config = match Config::load(config_path.as_deref().map(Path::new)) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("failed to load configuration: {e}");
            process::exit(1);
        }
    };

    let mut keyspace = Keyspace::new();
    if config.recovery_on_startup {
        let source = persistence::recovery::recover(&config, &mut keyspace);
        log::info!("startup recovery completed from {source:?}, {} keys loaded", keyspace.len());
    }

    let persistence_manager = match PersistenceManager::new(&config) {
        Ok(pm) => pm,
        Err(e) => {
            log::error!("failed to initialize persistence: {e}");
            process::exit(1);
        }
    };

    let mut server = match Server::bind(config, keyspace, PubSubRouter::new(), persistence_manager) {
        Ok(server) => server,
        Err(e) => {
            log::error!("failed to bind server: {e}");
            process::exit(1);
        }
    };

    install_signal_handlers();

    if let Err(e) = server.run(&RUNNING) {
        log::error!("server loop exited with error: {e}");
        process::exit(1);
    }

    log::info!("shut down gracefully");
}
