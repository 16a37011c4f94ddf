use msgbus_rpc::connect;
use tracing::debug;

use crate::cmd::{parse_duration, CallArgs};
use crate::exit::{connection_error, rpc_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let input = args.body.payload()?;

    let conn = connect(args.target.addr.as_str())
        .map_err(|err| connection_error("connect failed", err))?;

    let handle = conn
        .acall(&args.method, input)
        .map_err(|err| rpc_error("call failed", err))?;
    let id = handle.id();
    debug!(id, method = %args.method, ?timeout, "request sent");

    let output = handle
        .wait_timeout(timeout)
        .map_err(|err| rpc_error("call failed", err))?;
    print_message(id, "", &output, format);

    Ok(SUCCESS)
}
