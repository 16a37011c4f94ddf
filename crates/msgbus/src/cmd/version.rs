use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("msgbus {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: msgbus");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("MSGBUS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("wire_magic: {}", String::from_utf8_lossy(&msgbus_frame::MAGIC));
    println!(
        "max_payload_bytes: {}",
        msgbus_frame::DEFAULT_MAX_PAYLOAD
    );
    println!(
        "features: rpc={}, async={}, cli=true",
        cfg!(feature = "rpc"),
        cfg!(feature = "async")
    );

    Ok(SUCCESS)
}
