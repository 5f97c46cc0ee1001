use ant::error;
use ant::lang::{Error, FileLoader};
use ant::mach::{compile, CompiledProgram, Event, Natives, Vm};
use ansi_term::Style;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Compile an Ant BASIC program and run its modules.
#[derive(Parser, Debug)]
#[command(name = "antc")]
struct Options {
    /// Print the instruction listing of each module instead of running it
    #[arg(long)]
    list: bool,

    /// Bytes of memory for each module
    #[arg(long, default_value_t = 65536, value_parser = clap::value_parser!(u32).range(1..))]
    memory: u32,

    /// Instructions a module runs before the next one gets a turn
    #[arg(long, default_value_t = 10000, value_parser = clap::value_parser!(u32).range(1..))]
    quota: u32,

    /// Program to compile
    file: PathBuf,

    /// Only run modules on this executor
    executor: Option<String>,
}

pub fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let options = Options::parse();
    let interrupted = Arc::new(AtomicBool::new(false));
    let int_moved = interrupted.clone();
    if let Err(error) = ctrlc::set_handler(move || {
        int_moved.store(true, Ordering::SeqCst);
    }) {
        warn!(%error, "no Ctrl-C handler");
    }
    if let Err(error) = main_loop(&options, interrupted) {
        eprintln!("{}", Style::new().bold().paint(error.to_string()));
        std::process::exit(1);
    }
}

fn main_loop(options: &Options, interrupted: Arc<AtomicBool>) -> Result<(), Error> {
    let path = options.file.as_path();
    let root = path.parent().unwrap_or_else(|| Path::new(""));
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy().to_string(),
        None => return Err(error!(ImportNotFound; "{}", path.display())),
    };
    let program = compile(&FileLoader::new(root), &name)?;
    if options.list {
        for module in program.modules() {
            println!("{}", module.listing());
        }
        return Ok(());
    }
    let mut natives = Natives::standard();
    natives.insert("print", |memory, sp| {
        let address = memory.read_i32(sp + 4)?;
        println!("{}", memory.read_string(address)?);
        Ok(())
    });
    let mut ants = start(&program, options)?;
    while ants.iter().any(|(_, vm)| vm.event() == Event::Running) {
        if interrupted.load(Ordering::SeqCst) {
            info!("interrupted");
            break;
        }
        for (name, vm) in ants.iter_mut() {
            if vm.event() != Event::Running {
                continue;
            }
            match vm.run(&mut natives, options.quota as usize) {
                Event::Running => {}
                Event::Stopped => info!(module = name.as_str(), "halted"),
                Event::Fault(code) => {
                    warn!(module = name.as_str(), %code, ip = vm.ip(), "halted with error");
                    let message = format!("{} IN MODULE {} AT {}", code, name, vm.ip());
                    eprintln!("{}", Style::new().bold().paint(message));
                }
            }
        }
        transmit(&program, &mut ants);
    }
    Ok(())
}

/// One machine per module on the selected executor, or on every executor.
fn start(program: &CompiledProgram, options: &Options) -> Result<Vec<(String, Vm)>, Error> {
    let mut ants = vec![];
    for (executor, modules) in program.executors() {
        if options.executor.as_deref().map_or(false, |e| e != executor) {
            continue;
        }
        for module in modules {
            let vm = Vm::new(module, options.memory as usize)
                .map_err(|code| error!(InternalError; "{} IN MODULE {}", code, module.name()))?;
            info!(module = module.name(), executor, "started");
            ants.push((module.name().to_string(), vm));
        }
    }
    if ants.is_empty() {
        warn!(executor = ?options.executor, "nothing to run");
    }
    Ok(ants)
}

/// Copy every channel whose two ends are running here.
fn transmit(program: &CompiledProgram, ants: &mut [(String, Vm)]) {
    for binding in program.bindings() {
        let from = ants.iter().position(|(name, _)| *name == binding.source.module);
        let to = ants.iter().position(|(name, _)| *name == binding.destination.module);
        let (from, to) = match (from, to) {
            (Some(from), Some(to)) if from != to => (from, to),
            _ => continue,
        };
        let (source, destination) = if from < to {
            let (left, right) = ants.split_at_mut(to);
            (&left[from].1, &mut right[0].1)
        } else {
            let (left, right) = ants.split_at_mut(from);
            (&right[0].1, &mut left[to].1)
        };
        if let Err(code) = binding.transfer(source, destination) {
            warn!(%code, from = %binding.source.module, to = %binding.destination.module, "transfer failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options() {
        let options = Options::try_parse_from(["antc", "main.bas"]).unwrap();
        assert!(!options.list);
        assert_eq!((options.memory, options.quota), (65536, 10000));
        assert_eq!(options.file, PathBuf::from("main.bas"));
        assert_eq!(options.executor, None);

        let args = ["antc", "--list", "--memory", "4096", "--quota", "50", "app/main.bas", "Browser"];
        let options = Options::try_parse_from(args).unwrap();
        assert!(options.list);
        assert_eq!((options.memory, options.quota), (4096, 50));
        assert_eq!(options.executor.as_deref(), Some("Browser"));
    }

    #[test]
    fn test_bad_options() {
        assert!(Options::try_parse_from(["antc"]).is_err());
        assert!(Options::try_parse_from(["antc", "--quota", "0", "main.bas"]).is_err());
        assert!(Options::try_parse_from(["antc", "--memory", "lots", "main.bas"]).is_err());
        assert!(Options::try_parse_from(["antc", "--verbose", "main.bas"]).is_err());
        assert!(Options::try_parse_from(["antc", "a.bas", "Browser", "extra"]).is_err());
    }
}
