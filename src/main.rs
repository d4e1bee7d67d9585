use anyhow::{bail, Error};
use std::io::BufRead;
use std::io::Write;

mod builder;
mod eval;
mod input;
mod tokenizer;

use builder::{ExpressionBuilder, FlashToken};
use input::Action;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Error> {
    let mut pad = ExpressionBuilder::default();

    let args = std::env::args_os().skip(1);
    let stdout = std::io::stdout();
    let lock = stdout.lock();
    let mut w = std::io::BufWriter::new(lock);

    if args.len() > 0 {
        for arg in args {
            let Some(utf8_arg) = arg.to_str() else {
                bail!("Arguments contain invalid UTF-8 string");
            };

            for key in utf8_arg.chars() {
                if key.is_whitespace() {
                    continue;
                }
                let Some(action) = Action::from_key(key) else {
                    bail!("Unbound key: {:?}", key);
                };
                if pad.handle(action).is_some() {
                    if let Some(err) = pad.transient() {
                        bail!("{}", err);
                    }
                }
            }
        }

        if !pad.expression().is_empty() {
            pad.handle(Action::Submit);
        }
        if pad.outcome().is_error() {
            bail!("{}", pad.result_text());
        }
        writeln!(&mut w, "{}", pad.result_text())?;
    } else {
        let stdin = std::io::stdin();
        let reader = std::io::BufReader::new(stdin);
        let is_interactive = atty::is(atty::Stream::Stdin);
        let mut flash: Option<FlashToken> = None;

        if is_interactive {
            write!(&mut w, ">>> ")?;
            w.flush()?;
        }

        for line in reader.lines() {
            // The previous line's transient error expires with new input.
            if let Some(token) = flash.take() {
                pad.expire(token);
            }

            for key in line?.chars() {
                if let Some(action) = Action::from_key(key) {
                    if let Some(token) = pad.handle(action) {
                        flash = Some(token);
                    }
                }
            }

            if !pad.expression().is_empty() {
                writeln!(&mut w, "  {}", pad.expression())?;
            }
            if let Some(err) = pad.transient() {
                writeln!(&mut w, "! {}", err)?;
            } else {
                let result = pad.result_text();
                if !result.is_empty() {
                    writeln!(&mut w, "= {}", result)?;
                }
            }

            if is_interactive {
                write!(&mut w, ">>> ")?;
                w.flush()?;
            }
        }
    }
    w.flush()?;

    Ok(())
}
