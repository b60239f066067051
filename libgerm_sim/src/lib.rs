//! # germ_sim
//!
//! germ_sim emulates the front-end of a germanium strip detector readout, written in Rust. It
//! stands in for the real board when testing data acquisition software: it answers register
//! commands, learns where to send data from an arm request, and when a run is started it
//! generates simulated detector hits and streams them as UDP frames, while publishing the same
//! data to any connected subscribers.
//!
//! ## Installation
//!
//! The only method of install is from source. If you have not used Rust before, you will need to
//! install the Rust tool chain. See the [Rust docs](https://www.rust-lang.org/tools/install) for
//! installation instructions.
//!
//! To build and install the CLI use `cargo install --path ./germ_sim_cli` from the top level
//! germ_sim repository. The binary is installed to your cargo install location (typically
//! something like `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! The emulator is configured with a YAML file. A template can be generated with
//! `germ_sim_cli -p config.yml new`. The format is as follows:
//!
//! ```yml
//! control_address: 0.0.0.0:5555
//! publish_address: 0.0.0.0:5556
//! arm_address: 127.0.0.1:32000
//! register_echo_address: 127.0.0.1:32001
//! data_port: 32003
//! simulator:
//!   mean_events_per_message: 500000.0
//!   messages_per_run: 50
//!   simulated_exposure: 10.0
//!   n_chips: 12
//!   n_chans: 32
//!   seed: 0
//! ```
//!
//! - control_address: TCP address of the register command channel
//! - publish_address: TCP address broadcast subscribers connect to
//! - arm_address: UDP address receiving arm/disarm requests. Data frames are also sent from it
//! - register_echo_address: UDP address that echoes datagrams back. Set to `null` to disable
//! - data_port: Port on the armed host that data frames are sent to
//! - simulator: Mean number of events per message, number of messages per run, the average
//! exposure of a run in seconds, the number of chips and channels per chip, and the random seed
//! (0 seeds from entropy)
//!
//! ## Protocols
//!
//! ### Control
//!
//! Requests and replies are frames of a big-endian u32 length followed by a body. A body is one
//! or more commands of three little-endian i32: `(kind, address, value)`, handled in order, and
//! the reply holds one triple per command. Kind 0 reads a register, kind 1 writes one. Writing 1
//! to register 0 starts a run; the reply is sent before the run begins. Anything else is answered
//! with `(0xDEAD, 0xDEAD, 0xDEAD)`, and a body that is not a whole number of commands gets a
//! single such reply. Register 54 reads back the number of runs.
//!
//! ### Arming
//!
//! A UDP datagram of three big-endian u32 `(0xDEADBEEF, unused, enable)` arms (or disarms) the
//! emulator. Data is sent to the IP of the last host that armed it, on the data port. The reply
//! is four pad bytes followed by the big-endian u32 `0x4F6B6179`. Other datagrams are ignored.
//!
//! ### Data frames
//!
//! The event stream of a run is cut into UDP frames of at most 4096 bytes, headers big-endian:
//!
//! ```text
//! first:        [sequence = 0] [0xFEEDFACE] [run number] [payload]
//! continuation: [sequence] [payload]
//! final:        [sequence] [payload] [0] [0xDECAFBAD]
//! ```
//!
//! Every run that generated data starts with a first frame, even a short one, and every run ends
//! with a final frame, even when it carries no payload.
//!
//! ### Broadcast
//!
//! Subscribers connect over TCP and receive two part messages (see [`broadcast`]): `data` with
//! the bytes of each generated message and `meta` with the run number once the run completes.
//!
//! ### Event format
//!
//! Each event is two big-endian u32 words:
//!
//! ```text
//! word 0: [0][chip: 4][channel: 5][fine timestamp: 10][amplitude: 12]
//! word 1: [1000][coarse timestamp: 28]
//! ```
pub mod arming;
pub mod broadcast;
pub mod client;
pub mod command;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod framer;
pub mod link;
pub mod registers;
pub mod run;
pub mod run_status;
pub mod service;
pub mod simulator;
