// reads frames from the daq board, checks that the embedded counter never skips
// and prints the read latency of every batch.

use clap::Parser;
use daqcheck::config::{DeviceConfig, SessionConfig, TransferKind};
use daqcheck::layout::Variant;
use daqcheck::session::{CancelToken, Event, Session};
use daqcheck::usb::UsbTransport;
use std::time::Duration;

fn parse_id(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid id {}: {}", s, e))
}

fn parse_variant(s: &str) -> Result<Variant, String> {
    Variant::parse(s).map_err(|e| e.to_string())
}

fn parse_endpoint(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid endpoint {}: {}", s, e))
}

#[derive(Parser, Debug)]
#[command(name = "counter_check", version, about = "DAQ frame counter and latency check")]
struct Args {
    /// Firmware variant: multi-channel, counter16, timed8
    #[arg(long, value_parser = parse_variant, default_value = "counter16")]
    variant: Variant,

    #[arg(long, value_parser = parse_id, default_value = "0x03eb")]
    vid: u16,

    #[arg(long, value_parser = parse_id, default_value = "0x204f")]
    pid: u16,

    #[arg(long, default_value_t = 0)]
    interface: u8,

    #[arg(long = "in-endpoint", value_parser = parse_endpoint)]
    in_endpoint: Option<u8>,

    #[arg(long = "out-endpoint", value_parser = parse_endpoint)]
    out_endpoint: Option<u8>,

    /// Frame length in bytes, defaults to the variant's
    #[arg(long = "frame-len")]
    frame_len: Option<usize>,

    /// Reads per batch, defaults to the variant's
    #[arg(long = "batch-len")]
    batch_len: Option<u32>,

    /// Stop after this many batches instead of running forever. This is the
    /// only clean exit: killing the process skips releasing the interface.
    #[arg(long)]
    batches: Option<u64>,

    #[arg(long = "timeout-ms", default_value_t = 5000)]
    timeout_ms: u64,

    /// Use bulk instead of interrupt transfers
    #[arg(long)]
    bulk: bool,

    /// Send the zeroed start command even if the variant does not need it
    #[arg(long, conflicts_with = "no_prime")]
    prime: bool,

    #[arg(long = "no-prime")]
    no_prime: bool,

    /// Stop at the first counter error
    #[arg(long = "fail-fast")]
    fail_fast: bool,
}

impl Args {
    fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            vid: self.vid,
            pid: self.pid,
            interface: self.interface,
            transfer: if self.bulk {
                TransferKind::Bulk
            } else {
                TransferKind::Interrupt
            },
            ..DeviceConfig::default()
        }
    }

    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::for_variant(self.variant);
        if let Some(frame_len) = self.frame_len {
            config.frame_len = frame_len;
        }
        if let Some(batch_len) = self.batch_len {
            config.batch_len = batch_len;
        }
        if let Some(endpoint) = self.in_endpoint {
            config.in_endpoint = endpoint;
        }
        if let Some(endpoint) = self.out_endpoint {
            config.out_endpoint = endpoint;
        }
        config.max_batches = self.batches;
        config.timeout = Duration::from_millis(self.timeout_ms);
        config.prime = (config.prime || self.prime) && !self.no_prime;
        config.fail_fast = self.fail_fast;
        config
    }
}

fn print_event(event: &Event) {
    match event {
        Event::Baseline { counter } => println!("started receiving data at counter {}", counter),
        Event::Anomaly {
            anomaly,
            counter,
            expected,
            error_count,
            status,
        } => match status {
            Some(free) => println!(
                "{:?} at data {} (expected {})\t[ERROR:{}]\t[FREE BUFFER:{}]",
                anomaly, counter, expected, error_count, free
            ),
            None => println!(
                "{:?} at data {} (expected {})\t[ERROR:{}]",
                anomaly, counter, expected, error_count
            ),
        },
        Event::Batch(report) => {
            let sample = &report.sample;
            let latency = sample
                .avg_latency
                .map(|l| format!("{} us", l.as_micros()))
                .unwrap_or_else(|| "n/a".to_string());
            let rate = sample
                .bytes_per_second()
                .map(|r| format!("{:.3} MB/s", r / 1024. / 1024.))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "batch {}: read {} packets in {} us, average read delay {}, {}, \
                 {} idle slots, {} errors",
                report.index,
                sample.batch_size,
                sample.elapsed.as_micros(),
                latency,
                rate,
                report.idle_records,
                report.error_count
            );
        }
    }
}

fn run(args: &Args) -> Result<(), failure::Error> {
    let transport = UsbTransport::open(&args.device_config())?;
    let session = Session::new(transport, args.session_config())?;

    println!(
        "checking {} frames from {:04x}:{:04x}",
        args.variant.name(),
        args.vid,
        args.pid
    );
    // nothing cancels this yet, the run ends at --batches or on a fatal error
    let summary = session.run(&CancelToken::new(), print_event)?;
    println!(
        "done: {} batches, {} frames, {} errors, last counter {:?}",
        summary.batches, summary.frames, summary.error_count, summary.last_counter
    );
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        let code = match err.downcast_ref::<daqcheck::session::SessionError>() {
            Some(err) => err.code(),
            None => match err.downcast_ref::<daqcheck::transport::TransportError>() {
                Some(err) => err.code(),
                None => 1,
            },
        };
        std::process::exit(code.abs().max(1));
    }
}
