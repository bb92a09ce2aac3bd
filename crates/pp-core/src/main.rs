use pp_core::config::Config;
use pp_core::logging;
use pp_core::repl::{run_once, run_repl};

fn print_help() {
    println!("productpulse — chat with the Product Pulse shopping agent");
    println!();
    println!("Usage:");
    println!("  productpulse                  Interactive chat");
    println!("  productpulse \"question\"       Ask once and exit");
    println!();
    println!("Options:");
    println!("  --endpoint <url>  Agent proxy chat endpoint");
    println!("  --region <tag>    Region forwarded to the agent (default: us)");
    println!("  --version         Print version");
    println!("  --help            Print this help");
    println!();
    println!("Environment:");
    println!("  PRODUCTPULSE_ENDPOINT, PRODUCTPULSE_REGION, RUST_LOG, NO_COLOR");
}

struct Args {
    endpoint: Option<String>,
    region: Option<String>,
    prompt: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut parsed = Args {
        endpoint: None,
        region: None,
        prompt: None,
    };
    let mut positional = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--endpoint" => {
                let value = iter.next().ok_or("--endpoint needs a value")?;
                parsed.endpoint = Some(value.clone());
            }
            "--region" => {
                let value = iter.next().ok_or("--region needs a value")?;
                parsed.region = Some(value.clone());
            }
            flag if flag.starts_with('-') => return Err(format!("unknown option: {flag}")),
            _ => positional.push(arg.as_str()),
        }
    }

    if !positional.is_empty() {
        parsed.prompt = Some(positional.join(" "));
    }
    Ok(parsed)
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("productpulse {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let args = match parse_args(&args) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("hint: run productpulse --help");
            std::process::exit(2);
        }
    };

    let (mut config, config_error) = Config::load();
    logging::init(&config.log.filter);
    if let Some(e) = config_error {
        tracing::warn!("{e}; using defaults");
    }
    if let Some(endpoint) = args.endpoint {
        config.agent.endpoint = endpoint;
    }
    if let Some(region) = args.region {
        config.agent.region = Some(region);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create async runtime: {e}");
            std::process::exit(1);
        }
    };

    if let Some(prompt) = args.prompt {
        match runtime.block_on(run_once(&config, &prompt)) {
            Ok(code) => std::process::exit(code),
            Err(e) => {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = runtime.block_on(run_repl(&config)) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
