use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::evaluator::Evaluator;
use crate::object::{Environment, Object};

pub struct ReplConfig {
    pub prompt: String,
    /// Print `null` results too, e.g. after a `let`.
    pub echo_null: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            prompt: ">> ".to_owned(),
            echo_null: false,
        }
    }
}

/// Reads lines from `input` until it is exhausted, evaluating each one as a
/// program of its own. All lines share one environment.
pub fn start<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    config: &ReplConfig,
) -> io::Result<()> {
    let mut env = Environment::new();

    loop {
        write!(output, "{}", config.prompt)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }
        debug!(line = line.trim_end(), "read line");

        let (program, errors) = crate::parse(&line);

        if !errors.is_empty() {
            print_parser_errors(&mut output, &errors)?;
            continue;
        }

        let evaluated = Evaluator::with_output(&mut env, &mut output).eval_program(&program);

        match evaluated {
            Ok(Object::Null) if !config.echo_null => {}
            Ok(obj) => writeln!(output, "{}", obj)?,
            Err(err) => writeln!(output, "{}", Object::Error(err.to_string()))?,
        }
    }
}

fn print_parser_errors<W: Write>(output: &mut W, errors: &[String]) -> io::Result<()> {
    writeln!(
        output,
        r#"            __,__
   .--.  .-"     "-.  .--.
  / .. \/  .-. .-.  \/ .. \
 | |  '|  /   Y   \  |'  | |
 | \   \  \ 0 | 0 /  /   / |
  \ '- ,\.-"""""""-./, -' /
   ''-' /_   ^ ^   _\ '-''
       |  \._   _./  |
       \   \ '~' /   /
        '._ '-=-' _.'
           '-----'
"#
    )?;
    writeln!(output, "Woops! We ran into some monkey business here!")?;
    for error in errors {
        writeln!(output, "\t{}", error)?;
    }

    Ok(())
}
