// Copyright 2022-2026 SwiftDB developers.
// This file is part of SwiftDB.

// SwiftDB is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// SwiftDB is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with SwiftDB.  If not, see <http://www.gnu.org/licenses/>.

//! Log sink for the server executable: UTC timestamps, colored levels on
//! a tty, `RUST_LOG` overrides on top of an info default.

use std::env;
use std::io::Write;

use ansi_term::Colour;
use chrono::Utc;
use env_logger::Builder as LogBuilder;
use log::{Level, LevelFilter};

fn paint_level(level: Level) -> String {
    let label = level.to_string();
    match level {
        Level::Error => Colour::Red.bold().paint(label).to_string(),
        Level::Warn => Colour::Yellow.bold().paint(label).to_string(),
        Level::Info => Colour::Green.paint(label).to_string(),
        Level::Debug => Colour::Blue.paint(label).to_string(),
        Level::Trace => Colour::Purple.paint(label).to_string(),
    }
}

/// Installs the process-wide logger. Safe to call once per process;
/// later calls are ignored.
pub fn setup_log() {
    let mut builder = LogBuilder::new();
    builder.filter(None, LevelFilter::Info);

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    let color = atty::is(atty::Stream::Stderr);

    builder.format(move |buf, record| {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        if color {
            writeln!(
                buf,
                "{} {} {}  {}",
                Colour::Black.bold().paint(timestamp.to_string()),
                paint_level(record.level()),
                record.target(),
                record.args()
            )
        } else {
            writeln!(
                buf,
                "{} {} {}  {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            )
        }
    });

    let _ = builder.try_init();
}
