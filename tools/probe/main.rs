// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: GPL-3.0-only OR LicenseRef-Slint-Royalty-free-2.0 OR LicenseRef-Slint-Software-3.0

use clap::Parser;
use headless_gl::{DisplaySelection, Flags, Platform};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Requested OpenGL major version
    #[arg(long, default_value_t = 3, action)]
    major: u8,

    /// Requested OpenGL minor version
    #[arg(long, default_value_t = 3, action)]
    minor: u8,

    /// Request a core profile context
    #[arg(long, action)]
    core: bool,

    /// Request a compatibility profile context
    #[arg(long, action)]
    compat: bool,

    /// Request a debug context
    #[arg(long, action)]
    debug: bool,

    /// Which display to use ('auto', 'default' or 'device'). Defaults to HEADLESS_GL_DISPLAY
    #[arg(long, value_parser = |s: &str| DisplaySelection::try_from(s))]
    display: Option<DisplaySelection>,

    /// OpenGL functions to look up once the context is current
    #[arg(name = "function", action)]
    functions: Vec<String>,
}

fn main() -> Result<(), headless_gl::Error> {
    env_logger::Builder::default()
        .filter_level(if cfg!(debug_assertions) {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let args = Cli::parse();
    let mut platform = Platform::load()?;
    if let Some(selection) = args.display {
        platform = platform.with_display_selection(selection);
    }

    let mut flags = Flags::empty();
    flags.set(Flags::CORE, args.core);
    flags.set(Flags::COMPATIBILITY, args.compat);
    flags.set(Flags::DEBUG, args.debug);

    let context = platform.new_context(args.major, args.minor, flags)?;
    context.activate()?;

    let info = context.display_info();
    println!("display:     {:?}", context.display_kind());
    println!("egl version: {}.{}", info.egl_version.0, info.egl_version.1);
    println!("vendor:      {}", info.vendor);
    println!("version:     {}", info.version);
    println!("client apis: {}", info.client_apis);
    println!("context:     OpenGL {}.{} {:?}", args.major, args.minor, context.flags());
    log::debug!("display extensions: {}", info.extensions.join(" "));

    for name in &args.functions {
        let address = context.get_proc_address(name);
        if address.is_null() {
            println!("{name}: not found");
        } else {
            println!("{name}: {address:p}");
        }
    }

    context.destroy()
}
