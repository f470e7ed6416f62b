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

//! SwiftDB server executable.

use std::process;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = swiftdb::Config::parse(&args).unwrap_or_else(|e| {
        eprintln!("One or more command line arguments provided are incorrect: {e}");
        process::exit(1);
    });

    swiftdb::setup_log();

    if let Err(e) = swiftdb::start(config) {
        eprintln!("{e}");
        process::exit(1);
    }
}
