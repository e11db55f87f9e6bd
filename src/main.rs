// Copyright 2024 by the classo developers
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use this file except in compliance with
// the License. You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fs::File;

use log::{debug, error, info, warn};

use classo::{audit, balance, offerings};

fn main() {
    // Setup logging & parse command line arguments
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!(
        "This is the Class Repartition Optimizer (classo), version {}",
        option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
    );
    let args = parse_cli_args();

    if args.get_one::<String>("OUTPUT").is_none() && !args.get_flag("print") {
        warn!("No OUTPUT file and no --print option given. Assignment will not be exported anywhere.");
    }

    // Open & read input file
    let inpath: &String = args.get_one("INPUT").unwrap();
    debug!("Opening input file {} ...", inpath);
    let file = File::open(inpath).unwrap_or_else(|e| {
        error!("Could not open input file {}: {}", inpath, e);
        std::process::exit(exitcode::NOINPUT)
    });
    let (mut snapshot, mut config) = classo::io::simple::read(file).unwrap_or_else(|e| {
        error!("Could not read input file: {}", e);
        std::process::exit(exitcode::DATAERR)
    });

    // In debug build: Check consistency of imported data
    if cfg!(debug_assertions) {
        classo::io::assert_data_consistency(&snapshot.students, &snapshot.classes);
    }

    info!(
        "Found {} classes and {} students for balancing.",
        snapshot.classes.len(),
        snapshot.students.len()
    );
    debug!(
        "Classes:\n{}",
        classo::io::debug_list_of_classes(&snapshot.classes)
    );

    // Apply command line overrides of the run parameters
    if let Some(max_swaps) = args.get_one::<u32>("max_swaps") {
        config.max_swaps = *max_swaps;
    }
    if let Some(stagnation_limit) = args.get_one::<u32>("stagnation_limit") {
        config.stagnation_limit = *stagnation_limit;
    }
    let seed: u64 = *args.get_one("seed").unwrap_or(&0);

    // Optionally derive the mobility flags from the constraint and elective attributes
    if args.get_flag("derive_mobility") {
        let flags = offerings::compute_mobility(&snapshot.students, &snapshot.offerings);
        for (student, fixed) in snapshot.students.iter_mut().zip(&flags) {
            student.fixed = *fixed;
        }
        info!(
            "Mobility derived: {} of {} students are fixed.",
            flags.iter().filter(|f| **f).count(),
            flags.len()
        );
    }

    // Execute the balancing search
    let result = balance::optimize(&snapshot, &config, seed);
    info!("Finished balancing. {}", result.statistics);

    if !result.antinomy_validated {
        warn!("Antinomy not validated: the attribute is missing from the input data.");
    }
    for violation in &result.violations {
        warn!(
            "Class {} contains {} students sharing the antinomy code {}: {}",
            violation.class_name,
            violation.count,
            violation.code,
            violation.students.join(", ")
        );
    }

    if args.get_flag("audit") {
        let report = audit::audit(
            &result.final_assignment,
            &snapshot.students,
            &snapshot.classes,
            &snapshot.offerings,
        );
        info!("Assignment audit:\n{}", report);
    }

    if let Some(outpath) = args.get_one::<String>("OUTPUT") {
        debug!("Opening output file {} ...", outpath);
        match File::create(outpath) {
            Err(e) => error!("Could not open output file {}: {}.", outpath, e),
            Ok(file) => match classo::io::simple::write(file, &result) {
                Ok(_) => debug!("Assignment written to {}.", outpath),
                Err(e) => error!("Could not write assignment to {}: {}.", outpath, e),
            },
        }
    }

    if args.get_flag("print") {
        print!(
            "The assignment is:\n{}",
            classo::io::format_assignment(
                &result.final_assignment,
                &snapshot.classes,
                &snapshot.students
            )
        );
    }

    if !result.ok {
        warn!("The final assignment still contains antinomy violations.");
        std::process::exit(1);
    }
}

/// Helper function to construct and execute parser for command line options
fn parse_cli_args() -> clap::ArgMatches {
    clap::command!()
        .arg(
            clap::Arg::new("seed")
                .short('s')
                .long("seed")
                .help(
                    "Seed of the pseudo-random generator driving the search. The same seed on \
                     the same input reproduces the identical run. Defaults to 0.",
                )
                .value_name("SEED")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            clap::Arg::new("max_swaps")
                .long("max-swaps")
                .help("Iteration cap of the two-way swap phase. Overrides the input file's config.")
                .value_name("N")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            clap::Arg::new("stagnation_limit")
                .long("stagnation-limit")
                .help(
                    "Number of consecutive non-improving iterations before the search stops. \
                     Overrides the input file's config.",
                )
                .value_name("N")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            clap::Arg::new("derive_mobility")
                .short('m')
                .long("derive-mobility")
                .help(
                    "Label students as fixed before the run, based on their constraint codes and \
                     on whether their electives admit more than one class.",
                )
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("audit")
                .short('a')
                .long("audit")
                .help(
                    "Log a per-class audit of the final assignment: headcounts, gender split, \
                     elective histograms and quota deviations.",
                )
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("print")
                .short('p')
                .long("print")
                .help("Print the calculated class assignment to stdout in a human readable format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("INPUT")
                .help("Sets the input file to use")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("OUTPUT")
                .help("Sets the output file to use")
                .index(2),
        )
        .get_matches()
}
