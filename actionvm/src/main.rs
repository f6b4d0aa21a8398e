use clap::Parser as ClapParser;
use std::{fs, process, rc::Rc};

use actionvm::{Context, ContextCreateInfo, HeapSettings, Script, Value, disassemble};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Action stream to run
    #[arg(help = "File holding a raw action stream")]
    file: String,

    /// Print the action listing instead of executing
    #[arg(long)]
    disassemble: bool,

    /// Language version the script was compiled for
    #[arg(long, default_value_t = 8)]
    swf_version: u8,

    /// Bytes allocated between automatic collections
    #[arg(long)]
    gc_threshold: Option<usize>,

    /// Abort once this many bytes are in use
    #[arg(long)]
    memory_limit: Option<usize>,

    /// Ceiling for nested calls
    #[arg(long)]
    max_call_depth: Option<usize>,

    /// The file is hex text rather than raw bytes
    #[arg(long)]
    hex: bool,
}

fn decode_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    hex::decode(digits).map_err(|e| e.to_string())
}

fn load(cli: &Cli) -> Result<Vec<u8>, String> {
    if cli.hex {
        let text = fs::read_to_string(&cli.file).map_err(|e| e.to_string())?;
        decode_hex(&text)
    } else {
        fs::read(&cli.file).map_err(|e| e.to_string())
    }
}

fn describe(ctx: &mut Context, value: Value) -> String {
    match value {
        Value::String(_) => format!("{:?}", ctx.to_rust_string(value).as_ref()),
        Value::Object(_) => format!("{} {}", ctx.type_of(value), ctx.to_rust_string(value)),
        other => ctx.to_rust_string(other).to_string(),
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let bytes = match load(&cli) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("Error reading file '{}': {}", cli.file, err);
            process::exit(1);
        }
    };
    let script = Script::new(cli.file.clone(), cli.swf_version, bytes);

    if cli.disassemble {
        print!("{}", disassemble(&script));
        return;
    }

    let defaults = HeapSettings::default();
    let info = ContextCreateInfo {
        version: cli.swf_version,
        heap: HeapSettings {
            gc_threshold: cli.gc_threshold.unwrap_or(defaults.gc_threshold),
            memory_limit: cli.memory_limit.or(defaults.memory_limit),
        },
        max_call_depth: cli
            .max_call_depth
            .unwrap_or(ContextCreateInfo::default().max_call_depth),
        ..ContextCreateInfo::default()
    };
    let mut ctx = match Context::new(info) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(2);
        }
    };

    let values = ctx.execute(Rc::new(script));
    for line in ctx.trace_log().borrow().iter() {
        println!("{line}");
    }
    for value in values {
        println!("=> {}", describe(&mut ctx, value));
    }
    if let Some(reason) = ctx.aborted() {
        log::error!("{reason}");
        eprintln!("Aborted: {reason}");
        process::exit(3);
    }
    ctx.dispose();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_listings_may_contain_whitespace() {
        assert_eq!(decode_hex("96 05 00\n07 0a 00 00 00\n00"), Ok(vec![
            0x96, 0x05, 0x00, 0x07, 0x0a, 0x00, 0x00, 0x00, 0x00
        ]));
        assert!(decode_hex("9").is_err());
        assert!(decode_hex("zz").is_err());
    }
}
