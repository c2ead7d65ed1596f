use std::error::Error;
use std::io::{self, BufRead};
use std::process::ExitCode;

use clap::Parser;

use mimsrv::admin;
use mimsrv::app_context::AppContext;
use mimsrv::args::MimsrvArgs;
use mimsrv::config_loader::load_config;
use mimsrv::web_server::run_actix_server;

fn read_password() -> io::Result<String> {
    eprint!("New password: ");
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(|c: char| c == '\r' || c == '\n').to_string())
}

fn run(args: MimsrvArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(&args.config)?;
    if let Some(path) = args.password_file {
        config.auth.password_file = path;
    }
    let password_file = config.auth.password_file.clone();

    if args.create_password_file {
        admin::create_password_file(&password_file)?;
        println!("created password file {}", password_file.display());
        return Ok(());
    }

    if let Some(userid) = args.update_password.as_deref() {
        let password = match args.password {
            Some(password) => password,
            None => read_password()?,
        };
        admin::update_password(&password_file, userid, &password, args.permissions.as_deref())?;
        println!("updated password for {} in {}", userid, password_file.display());
        return Ok(());
    }

    let ctx = AppContext::new(config)?;
    actix_web::rt::System::new().block_on(run_actix_server(ctx))?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    match run(MimsrvArgs::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
