use clap::{value_parser, Arg, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;

use libgerm_sim::client::{request_arm, ControlClient, Published, Subscription};
use libgerm_sim::config::Config;
use libgerm_sim::registers::register_name;
use libgerm_sim::run_status::{RunPhase, RunStatus};
use libgerm_sim::service::serve;

/// How long to wait for an arm acknowledgment
const ARM_TIMEOUT: Duration = Duration::from_secs(5);

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not write template config: {e}"),
    }
}

/// Resolve a configured bind address into one a client on this host can reach
fn local_target(address: &str) -> Option<SocketAddr> {
    match address.parse::<SocketAddr>() {
        Ok(mut addr) => {
            if addr.ip().is_unspecified() {
                addr.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
            }
            Some(addr)
        }
        Err(e) => {
            log::error!("Bad address {address}: {e}");
            None
        }
    }
}

/// Display a register address with its name when it has one
fn describe_register(address: u32) -> String {
    match register_name(address) {
        Some(name) => format!("{name} ({address})"),
        None => format!("{address}"),
    }
}

fn run_client_command(config: &Config, name: &str, args: &ArgMatches) {
    let Some(target) = local_target(&config.control_address) else {
        return;
    };
    let mut client = match ControlClient::connect(target) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Could not connect to {target}: {e}");
            return;
        }
    };

    let result = match name {
        "read" => {
            let address = *args.get_one::<u32>("address").unwrap_or(&0);
            client.read(address).map(|value| {
                log::info!(
                    "Register {} = {value} ({value:#x})",
                    describe_register(address)
                );
            })
        }
        "write" => {
            let address = *args.get_one::<u32>("address").unwrap_or(&0);
            let value = *args.get_one::<i32>("value").unwrap_or(&0);
            client
                .write(address, value)
                .map(|_| log::info!("Wrote {value} to register {}", describe_register(address)))
        }
        _ => client.start().map(|_| log::info!("Run started")),
    };
    if let Err(e) = result {
        log::error!("{name} failed: {e}");
    }
}

fn run_arm_command(config: &Config, enable: bool) {
    let Some(target) = local_target(&config.arm_address) else {
        return;
    };
    let socket = match UdpSocket::bind("0.0.0.0:0") {
        Ok(s) => s,
        Err(e) => {
            log::error!("Could not open a UDP socket: {e}");
            return;
        }
    };
    if let Err(e) = socket.set_read_timeout(Some(ARM_TIMEOUT)) {
        log::error!("{e}");
        return;
    }
    match request_arm(&socket, target, enable) {
        Ok(()) if enable => log::info!(
            "Armed; data will be sent to this host on port {}",
            config.data_port
        ),
        Ok(()) => log::info!("Disarmed"),
        Err(e) => log::error!("Arm request to {target} failed: {e}"),
    }
}

/// Follow the broadcast channel, logging the event count of every completed run
fn run_subscribe_command(config: &Config) {
    let Some(target) = local_target(&config.publish_address) else {
        return;
    };
    let mut subscription = match Subscription::connect(target) {
        Ok(s) => s,
        Err(e) => {
            log::error!("Could not subscribe to {target}: {e}");
            return;
        }
    };
    log::info!("Subscribed to {target}");
    let mut events: u64 = 0;
    loop {
        match subscription.next_message() {
            Ok(Published::Data(batch)) => events += batch.len() as u64,
            Ok(Published::Meta { run_number }) => {
                log::info!("Run {run_number} complete: received {events} events");
                events = 0;
            }
            Err(e) => {
                log::error!("Subscription ended: {e}");
                return;
            }
        }
    }
}

fn main() {
    // Create a cli
    let address_arg = Arg::new("address")
        .required(true)
        .value_parser(value_parser!(u32))
        .help("Register address");
    let matches = Command::new("germ_sim_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("read")
                .about("Read a register of a running emulator")
                .arg(address_arg.clone()),
        )
        .subcommand(
            Command::new("write")
                .about("Write a register of a running emulator")
                .arg(address_arg)
                .arg(
                    Arg::new("value")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(value_parser!(i32))
                        .help("Register value"),
                ),
        )
        .subcommand(Command::new("start").about("Start a run on a running emulator"))
        .subcommand(Command::new("arm").about("Arm a running emulator to send data to this host"))
        .subcommand(Command::new("disarm").about("Stop a running emulator from sending data"))
        .subcommand(
            Command::new("subscribe").about("Follow the data broadcast of a running emulator"),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required");
        return;
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");

    match matches.subcommand() {
        Some((name @ ("read" | "write" | "start"), args)) => {
            run_client_command(&config, name, args);
            return;
        }
        Some(("arm", _)) => {
            run_arm_command(&config, true);
            return;
        }
        Some(("disarm", _)) => {
            run_arm_command(&config, false);
            return;
        }
        Some(("subscribe", _)) => {
            run_subscribe_command(&config);
            return;
        }
        _ => (),
    }

    log::info!("Control: {}", config.control_address);
    log::info!("Publish: {}", config.publish_address);
    log::info!("Arm: {}", config.arm_address);
    log::info!("Data Port: {}", config.data_port);
    log::info!(
        "Mean Events per Message: {} Messages per Run: {}",
        config.simulator.mean_events_per_message,
        config.simulator.messages_per_run
    );

    // Spawn the service! Statuses arrive until it stops
    let (tx, rx) = std::sync::mpsc::channel::<RunStatus>();
    let handle = std::thread::spawn(move || serve(&config, Some(tx)));

    let mut pb: Option<ProgressBar> = None;
    for status in rx.iter() {
        match status.phase {
            RunPhase::Generating => {
                let bar = pb.get_or_insert_with(|| pb_manager.add(ProgressBar::new(100)));
                bar.set_position((status.progress * 100.0) as u64);
            }
            RunPhase::Complete => {
                if let Some(bar) = pb.take() {
                    bar.finish();
                }
            }
            RunPhase::Idle => (),
        }
    }

    match handle.join() {
        Ok(result) => match result {
            Ok(_) => log::info!("Service stopped."),
            Err(e) => log::error!("Service failed with error: {e}"),
        },
        Err(_) => log::error!("Failed to join service task!"),
    }

    log::info!("Done.");
}
