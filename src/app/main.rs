//! Command-line emulator: loads a drum image and runs it at the original
//! machine speed until the program halts.

use litton1600::charset::Charset;
use litton1600::devices::{DEVICE_PUNCH, DEVICE_READER, Device};
use litton1600::panel::Button;
use litton1600::runner::{self, SharedMachine};
use litton1600::{Machine, StepOutcome, image};
use std::path::Path;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::env;

fn usage(progname: &str) {
    eprintln!("Usage: {} [options] image.drum", progname);
    eprintln!();
    eprintln!("Options:");
    eprintln!("    -f");
    eprintln!("        Fast mode; do not slow down to the original speed.");
    eprintln!("    -e ENTRY");
    eprintln!("        Set the entry point to the drum image, in hexadecimal.");
    eprintln!("    -s SIZE");
    eprintln!("        Set the size of the drum, in decimal; default 4096.");
    eprintln!("    -v");
    eprintln!("        Verbose disassembly of instructions as they are executed.");
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let progname = args[0].clone();
    let mut fast_mode = false;
    let mut verbose = false;
    let mut entry_point: Option<u16> = None;
    let mut drum_size: Option<u16> = None;
    let mut drum_image: Option<String> = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-f" => fast_mode = true,
            "-v" => verbose = true,
            "-e" => match iter.next().and_then(|v| u16::from_str_radix(v, 16).ok()) {
                Some(entry) => entry_point = Some(entry),
                None => {
                    usage(&progname);
                    process::exit(1);
                }
            },
            "-s" => match iter.next().and_then(|v| v.parse::<u16>().ok()) {
                Some(size) => drum_size = Some(size),
                None => {
                    usage(&progname);
                    process::exit(1);
                }
            },
            _ if arg.starts_with('-') => {
                usage(&progname);
                process::exit(1);
            }
            _ => {
                if drum_image.is_some() {
                    usage(&progname);
                    process::exit(1);
                }
                drum_image = Some(arg.clone());
            }
        }
    }
    let Some(drum_image) = drum_image else {
        usage(&progname);
        process::exit(1);
    };

    // Initialize the machine and apply the command-line overrides; image
    // metadata takes precedence over them.
    let mut machine = Machine::new();
    if let Some(entry) = entry_point {
        machine.set_entry_point(entry);
    }
    if let Some(size) = drum_size {
        machine.set_drum_size(size);
    }
    machine.disassemble = verbose;

    // Load the drum image into memory.
    if let Err(error) = image::load_drum(&mut machine, Path::new(&drum_image), None) {
        eprintln!("{}", error);
        process::exit(1);
    }

    // Create the standard devices.
    machine.create_default_devices();
    machine.add_device(Device::tape_punch(DEVICE_PUNCH, Charset::Ebs1231));
    machine.add_device(Device::tape_reader(DEVICE_READER, Charset::Ebs1231, String::new()));

    // Reset, then press HALT, READY and RUN to start the program.
    machine.reset();
    machine.press_button(Button::Halt);
    machine.press_button(Button::Ready);
    machine.press_button(Button::Run);

    let shared: SharedMachine = Arc::new(Mutex::new(machine));
    let quit = AtomicBool::new(false);
    let outcome = runner::run_until_halt(&shared, &quit, fast_mode);

    let machine = shared.lock().unwrap();
    let exit_status = match outcome {
        StepOutcome::Ok | StepOutcome::Halt => {
            // Halt code 0 conventionally means a clean program end.
            if machine.halt_code() != 0 {
                eprintln!(
                    "Halted at address {:03X}, halt code = {}",
                    machine.pc(),
                    machine.halt_code()
                );
                1
            } else {
                0
            }
        }
        StepOutcome::Illegal => {
            eprintln!("Illegal instruction at address {:03X}", machine.pc());
            1
        }
        StepOutcome::Spinning => {
            eprintln!("Spinning out of control at address {:03X}", machine.pc());
            1
        }
    };
    process::exit(exit_status);
}
