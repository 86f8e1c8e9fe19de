//! Command-line interface of `fragorb`.

use std::path::{Path, PathBuf};

use anyhow::{self, format_err};
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::interfaces::input::Input;
use crate::interfaces::InputHandle;
use crate::io::format::{fragorb_error, fragorb_output};

const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Logs a nicely formatted `fragorb` heading to the `fragorb-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    fragorb_output!("╭─────────────────────────────────────────────────────────────────────────────────────────────────────╮");
    fragorb_output!("│                                                                                                     │");
    fragorb_output!("│   ffff                                                      bb                                      │");
    fragorb_output!("│  ff     rr rrr   aaaa    gggg   oooo   rr rrr   bb          bb                                      │");
    fragorb_output!("│ ffff    rrr     aa  aa  gg  gg oo  oo  rrr      bbbbb       Symmetrized fragment orbital analysis   │");
    fragorb_output!("│  ff     rr      aa  aa  gg  gg oo  oo  rr       bb  bb      of fragment calculations                │");
    fragorb_output!("│  ff     rr       aaa a   ggggg  oooo   rr       bbbbb                                               │");
    fragorb_output!("│                             gg                                                                      │");
    fragorb_output!("│                         ggggg                                                         {version:>13} │");
    fragorb_output!("│                                                                                                     │");
    fragorb_output!("╰─────────────────────────────────────────────────────────────────────────────────────────────────────╯");
    fragorb_output!("");
}

#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// The YAML configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// The output file. If not given, the configuration file name with the `.out` extension is
    /// used.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Increases the verbosity of diagnostic messages on the console.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// The path the main output is written to.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.config.with_extension("out"))
    }

    fn console_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Sets up the `fragorb-output` logger writing into `output`, and a root logger writing
/// diagnostics to the console.
pub fn setup_logger<P: AsRef<Path>>(
    output: P,
    console_level: LevelFilter,
) -> Result<(), anyhow::Error> {
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{h({l}):<5} {t} - {m}{n}")))
        .build();
    let main_output = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{m}{n}")))
        .append(false)
        .build(output.as_ref())?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("main_output", Box::new(main_output)))
        .logger(
            Logger::builder()
                .appender("main_output")
                .additive(false)
                .build("fragorb-output", LevelFilter::Info),
        )
        .build(Root::builder().appender("console").build(console_level))?;
    log4rs::init_config(config).map_err(|err| format_err!(err))?;
    Ok(())
}

/// Runs `fragorb` as instructed on the command line.
pub fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    setup_logger(cli.output_path(), cli.console_level())?;
    log_heading();

    let result = Input::from_yaml(&cli.config).and_then(|input| input.handle());
    if let Err(err) = result.as_ref() {
        fragorb_error!("{err:#}");
    }
    result
}
