/// Display version information
pub fn execute() {
    println!("tollgate {}", env!("CARGO_PKG_VERSION"));
    println!("Proposal, timelock, freeze and veto gating for shared accounts");
}
