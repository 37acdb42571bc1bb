// Copyright (C) 2019-2026 The gossipmap authors.
// This file is part of the gossipmap library.

// The gossipmap library is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// The gossipmap library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with the gossipmap library. If not, see <https://www.gnu.org/licenses/>.

//! Rolling-file logging with an optional console mirror, the `tracing`
//! equivalent of `utils.configure_logger`'s `RotatingFileHandler` plus
//! `log_to_console`.

use std::path::Path;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Keeps the non-blocking writer's worker thread alive for the process
/// lifetime; drop it only at shutdown.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Configures a daily-rolling file appender at `logfile`'s directory/name,
/// with level driven by `debug` (matching `CONF['debug']`) and an optional
/// stdout mirror (`log_to_console`).
pub fn init(logfile: &str, log_to_console: bool, debug: bool) -> LoggingGuard {
    let path = Path::new(logfile);
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let filename = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_else(|| "gossipmap.log".to_string());

    let file_appender = tracing_appender::rolling::daily(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));

    if log_to_console {
        fmt().with_env_filter(env_filter).with_writer(non_blocking.and(std::io::stdout)).with_ansi(false).init();
    } else {
        fmt().with_env_filter(env_filter).with_writer(non_blocking).with_ansi(false).init();
    }

    LoggingGuard { _file_guard: guard }
}
