/// Display version information
pub fn execute() {
    println!("fairwage-discovery {}", env!("CARGO_PKG_VERSION"));
    println!("Payroll contract discovery and membership verification");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_execute() {
        // Version command should not panic
        execute();
    }
}
