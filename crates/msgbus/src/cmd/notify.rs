use msgbus_rpc::connect;

use crate::cmd::NotifyArgs;
use crate::exit::{connection_error, rpc_error, CliResult, SUCCESS};

pub fn run(args: NotifyArgs) -> CliResult<i32> {
    let input = args.body.payload()?;
    let conn = connect(args.target.addr.as_str())
        .map_err(|err| connection_error("connect failed", err))?;

    conn.notify(&args.method, input)
        .map_err(|err| rpc_error("notify failed", err))?;

    Ok(SUCCESS)
}
