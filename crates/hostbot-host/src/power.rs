use hostbot_core::callback::PowerOp;

use crate::command::Invocation;

pub fn invocation(op: PowerOp) -> Invocation {
    match op {
        PowerOp::Reboot => Invocation::new("reboot", Vec::<String>::new()),
        PowerOp::Shutdown => Invocation::new("shutdown", ["-h", "now"]),
    }
    .privileged()
}
