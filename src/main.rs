use anyhow::Context;
use clap::Parser;
use scopebind::config::toml_config::TomlConfig;
use scopebind::utils::{logger, validation::Validate};
use scopebind::{CliConfig, Module, Runner, ScopeError};

fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting scopebind");
    if args.verbose {
        tracing::debug!("CLI config: {:?}", args);
    }

    if let Err(e) = args.validate() {
        exit_with(&e);
    }

    tracing::info!("📁 Loading module from: {}", args.config);
    let mut config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 命令列覆蓋設定
    let mut settings = config.settings();
    args.apply_to(&mut settings);
    config.settings = Some(settings);

    if let Err(e) = config.validate() {
        exit_with(&e);
    }
    tracing::info!("✅ Module description loaded and validated");

    let module = config
        .build_module()
        .with_context(|| format!("building module '{}'", config.module.name))?;
    display_summary(&config, &module);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing is mounted");
        return Ok(());
    }

    let Some(run) = config.run.clone() else {
        tracing::info!("No [run] table, nothing to execute");
        return Ok(());
    };

    let mut runner = Runner::new(module);
    let report = match runner.run(&run) {
        Ok(report) => report,
        Err(e) => exit_with(&e),
    };

    // 最終 scope 狀態輸出到 stdout
    let output = serde_json::to_string_pretty(&report).context("serializing run report")?;
    println!("{}", output);
    Ok(())
}

fn display_summary(config: &TomlConfig, module: &Module) {
    let settings = module.settings();
    tracing::info!("📋 Module: {}", config.module.name);
    if let Some(description) = &config.module.description {
        tracing::info!("   {}", description);
    }
    tracing::info!(
        "⚙️  Conventions: scope '{}', prefix '{}', suffix '{}', observation {}",
        settings.scope_dependency, settings.service_prefix, settings.service_suffix,
        settings.observation
    );
    for name in module.names() {
        if let Some(factory) = module.factory(name) {
            let class = factory.class();
            tracing::info!(
                "🧩 {} ({}) inject {:?} expose {:?} watch {:?}",
                name,
                class.kind().name(),
                factory.inject(),
                class.lists().expose,
                class.lists().watch
            );
        }
    }
}

fn exit_with(e: &ScopeError) -> ! {
    tracing::error!("❌ {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());
    std::process::exit(1);
}
