use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("eoslink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: eoslink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "protocol_version: {}",
        eoslink_message::PROTOCOL_VERSION
    );
    println!(
        "build_target: {}",
        option_env!("EOSLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "rustc: {}",
        option_env!("RUSTC_VERSION").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "max_payload: {:#x} (first generation {:#x})",
        eoslink_frame::MAX_PAYLOAD_LEN,
        eoslink_frame::FIRST_GEN_MAX_PAYLOAD_LEN
    );
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
