//! Reference test framework for immersed-boundary validation
//!
//! Each reference test loads a case file, drives the immersed-boundary
//! pipeline through a number of steps against an analytic flow field and
//! validates tag shells, churn, reconstruction coverage and surface forces.


use kernel::{BodyForce, FieldBuffers, NodeFamily, NodeRole, StaggeredGrid, TagChurn};
use orchestrator::{aggregate_body_forces, ImmersedBoundarySystem};

/// Linear flow field `c0 + c1 x + c2 y` per variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearField {
    /// u-velocity coefficients
    pub u: [f64; 3],
    /// v-velocity coefficients
    pub v: [f64; 3],
    /// Pressure coefficients
    pub p: [f64; 3],
}

impl LinearField {
    /// Sample the field on every node family of `grid`
    pub fn sample(&self, grid: &StaggeredGrid) -> FieldBuffers {
        let eval = |c: [f64; 3]| move |x: f64, y: f64| c[0] + c[1] * x + c[2] * y;
        FieldBuffers::from_fn(grid, eval(self.u), eval(self.v), eval(self.p))
    }
}

/// Expected result criteria for a reference test
#[derive(Debug, Clone, Default)]
pub struct ExpectedResult {
    /// Size of one role shell after the last step
    pub shell_size: Option<ShellSizeCheck>,
    /// Tag churn between consecutive passes
    pub churn: Option<ChurnCheck>,
    /// Net force on all bodies after the last step
    pub force: Option<ForceCheck>,
    /// Every hybrid and ghost node gets a reconstruction record
    pub stencil_coverage: bool,
}

/// Compare the count of one role against an expected value
#[derive(Debug, Clone)]
pub struct ShellSizeCheck {
    /// Node family to count
    pub family: NodeFamily,
    /// Role to count
    pub role: NodeRole,
    /// Expected count
    pub expected: f64,
    /// Relative tolerance (0.0 to 1.0)
    pub tolerance: f64,
}

/// Bounds on how many tags change per pass
#[derive(Debug, Clone)]
pub struct ChurnCheck {
    /// Every pass after the first changes at least one tag
    pub require_motion: bool,
    /// Largest allowed changed count per pass, relative to the ghost shell
    pub max_per_ghost: f64,
}

/// Net force against an analytic value
#[derive(Debug, Clone)]
pub struct ForceCheck {
    /// Expected `[Fx, Fy]`
    pub expected: [f64; 2],
    /// Absolute tolerance per component
    pub tolerance: f64,
}

/// Result of running a reference test
#[derive(Debug)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Whether test passed
    pub passed: bool,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Net force after the last step
    pub final_force: BodyForce,
    /// Churn of every pass
    pub churn: Vec<TagChurn>,
    /// Number of steps executed
    pub steps: u64,
    /// Time of the last step
    pub sim_time: f64,
}

/// Result of an individual validation check
#[derive(Debug)]
pub struct CheckResult {
    /// Check name
    pub name: String,
    /// Whether check passed
    pub passed: bool,
    /// Detail or error message
    pub message: Option<String>,
}

impl CheckResult {
    fn new(name: &str, passed: bool, message: String) -> Self {
        Self { name: name.to_string(), passed, message: Some(message) }
    }
}

/// A reference test case
pub struct ReferenceTest {
    /// Test name
    pub name: String,
    /// Path to configuration file
    pub config_path: String,
    /// Number of steps to run
    pub steps: u64,
    /// Sub-step size
    pub dt: f64,
    /// Flow field handed to the stencil and force passes
    pub field: LinearField,
    /// Expected results to validate
    pub expected: ExpectedResult,
}

impl ReferenceTest {
    /// Run the reference test and return results
    pub fn run(&self) -> Result<TestResult, String> {
        tracing::info!("Running reference test: {}", self.name);

        let mut system = ImmersedBoundarySystem::from_file(&self.config_path).map_err(|e| e.to_string())?;
        let field = self.field.sample(system.grid());

        let mut churn = Vec::with_capacity(self.steps as usize);
        let mut checks = Vec::new();
        let mut coverage_misses = 0;
        let mut sim_time = 0.0;

        for step in 0..self.steps {
            sim_time = step as f64 * self.dt;
            churn.push(system.advance(sim_time, step, self.dt).map_err(|e| e.to_string())?);
            system.tags().verify_partition().map_err(|e| e.to_string())?;

            system.build_stencils(&field.view(self.dt)).map_err(|e| e.to_string())?;
            for family in NodeFamily::ALL {
                if system.records().len(family) != system.tags().boundary_nodes(family).len() {
                    coverage_misses += 1;
                }
            }
            system.compute_forces(&field.view(self.dt)).map_err(|e| e.to_string())?;
        }
        tracing::info!("Run complete: {} steps, t = {:.6}", self.steps, sim_time);

        let final_force = aggregate_body_forces(&system.forces().bodies);

        if let Some(ref shell) = self.expected.shell_size {
            checks.push(validate_shell_size(&system, shell));
        }
        if let Some(ref bounds) = self.expected.churn {
            checks.push(validate_churn(&churn, bounds));
        }
        if let Some(ref force) = self.expected.force {
            checks.push(validate_force(&final_force, force));
        }
        if self.expected.stencil_coverage {
            checks.push(CheckResult::new(
                "Stencil Coverage",
                coverage_misses == 0,
                format!("{} family passes without a record per shell node", coverage_misses),
            ));
        }

        Ok(TestResult {
            name: self.name.clone(),
            passed: checks.iter().all(|c| c.passed),
            checks,
            final_force,
            churn,
            steps: self.steps,
            sim_time,
        })
    }
}

/// Validate the size of one role shell
fn validate_shell_size(system: &ImmersedBoundarySystem, check: &ShellSizeCheck) -> CheckResult {
    let count = system.family_tags(check.family).count(check.role) as f64;
    let error = (count / check.expected - 1.0).abs();
    CheckResult::new(
        "Shell Size",
        error <= check.tolerance,
        format!(
            "{} {:?} nodes: {} (expected {:.1}, error {:.1}%, tolerance {:.1}%)",
            check.family,
            check.role,
            count,
            check.expected,
            error * 100.0,
            check.tolerance * 100.0
        ),
    )
}

/// Validate tag churn across passes
fn validate_churn(churn: &[TagChurn], check: &ChurnCheck) -> CheckResult {
    let mut issues = Vec::new();
    for pass in churn.iter().skip(1) {
        let ghosts: usize = pass.roles.iter().map(|r| r.ghost).sum();
        let limit = check.max_per_ghost * ghosts as f64;
        if check.require_motion && pass.total_changed() == 0 {
            issues.push(format!("step {}: no tag changed", pass.step));
        }
        if pass.total_changed() as f64 > limit {
            issues.push(format!("step {}: {} changed (limit {:.0})", pass.step, pass.total_changed(), limit));
        }
    }

    if issues.is_empty() {
        let peak = churn.iter().skip(1).map(TagChurn::total_changed).max().unwrap_or(0);
        CheckResult::new("Tag Churn", true, format!("{} passes, peak {} changed", churn.len(), peak))
    } else {
        CheckResult::new("Tag Churn", false, issues.join(", "))
    }
}

/// Validate the net force
fn validate_force(force: &BodyForce, check: &ForceCheck) -> CheckResult {
    let error = (0..2)
        .map(|c| (force.net_force[c] - check.expected[c]).abs())
        .fold(0.0_f64, f64::max);
    CheckResult::new(
        "Net Force",
        error <= check.tolerance,
        format!(
            "Expected: [{:.6}, {:.6}], Got: [{:.6}, {:.6}] (error {:.2e}, tolerance {:.2e})",
            check.expected[0], check.expected[1], force.net_force[0], force.net_force[1], error, check.tolerance
        ),
    )
}

impl TestResult {
    /// Print a summary of the test result
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(80));
        println!("Test: {}", self.name);
        println!("{}", "=".repeat(80));
        println!("Status: {}", if self.passed { "PASSED" } else { "FAILED" });
        println!("Steps: {}", self.steps);
        println!("Final time: {:.6}", self.sim_time);
        if let Some(last) = self.churn.last() {
            println!("\nLast Pass:");
            for (family, roles) in NodeFamily::ALL.iter().zip(last.roles.iter()) {
                println!(
                    "  {}: {} hybrid, {} ghost, {} solid",
                    family, roles.hybrid, roles.ghost, roles.solid
                );
            }
        }
        println!(
            "  Net force: [{:.6}, {:.6}] (pressure [{:.6}, {:.6}], viscous [{:.6}, {:.6}])",
            self.final_force.net_force[0],
            self.final_force.net_force[1],
            self.final_force.pressure_force[0],
            self.final_force.pressure_force[1],
            self.final_force.viscous_force[0],
            self.final_force.viscous_force[1]
        );
        println!("\nValidation Checks:");
        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            print!("  [{}] {}", status, check.name);
            if let Some(ref msg) = check.message {
                print!(" - {}", msg);
            }
            println!();
        }
        println!("{}", "=".repeat(80));
    }
}

/// Static cylinder: ghost shell tracks the circumference, uniform pressure
/// exerts no net force
pub fn static_cylinder_test(config_path: String) -> ReferenceTest {
    let (radius, h) = (0.2, 0.01);
    ReferenceTest {
        name: "Static Cylinder".to_string(),
        config_path,
        steps: 2,
        dt: 1e-3,
        field: LinearField { p: [3.0, 0.0, 0.0], ..LinearField::default() },
        expected: ExpectedResult {
            shell_size: Some(ShellSizeCheck {
                family: NodeFamily::P,
                role: NodeRole::Ghost,
                expected: 2.0 * std::f64::consts::PI * radius / h,
                tolerance: 0.2,
            }),
            churn: Some(ChurnCheck { require_motion: false, max_per_ghost: 0.0 }),
            force: Some(ForceCheck { expected: [0.0, 0.0], tolerance: 1e-9 }),
            stencil_coverage: true,
        },
    }
}

/// Translating cylinder in a co-moving flow: tags follow the body and the
/// wall feels no force
pub fn translating_cylinder_test(config_path: String) -> ReferenceTest {
    ReferenceTest {
        name: "Translating Cylinder".to_string(),
        config_path,
        steps: 5,
        dt: 0.01,
        field: LinearField { u: [1.0, 0.0, 0.0], ..LinearField::default() },
        expected: ExpectedResult {
            shell_size: None,
            churn: Some(ChurnCheck { require_motion: true, max_per_ghost: 6.0 }),
            force: Some(ForceCheck { expected: [0.0, 0.0], tolerance: 1e-9 }),
            stencil_coverage: true,
        },
    }
}

/// Cylinder in a linear pressure field `p = a y`
///
/// Probes sit on a circle of radius `R + delta`, so the net force is
/// `-a pi R (R + delta)` along y.
pub fn pressure_load_test(config_path: String) -> ReferenceTest {
    let (a, radius, delta) = (2.0, 0.25, 1.5 / 64.0);
    let expected = -a * std::f64::consts::PI * radius * (radius + delta);
    ReferenceTest {
        name: "Linear Pressure Load".to_string(),
        config_path,
        steps: 1,
        dt: 1e-3,
        field: LinearField { p: [0.0, 0.0, a], ..LinearField::default() },
        expected: ExpectedResult {
            shell_size: None,
            churn: None,
            force: Some(ForceCheck { expected: [0.0, expected], tolerance: 1e-3 * expected.abs() }),
            stencil_coverage: true,
        },
    }
}

/// Marker-file square under direct forcing
pub fn direct_forcing_square_test(config_path: String) -> ReferenceTest {
    ReferenceTest {
        name: "Direct Forcing Square".to_string(),
        config_path,
        steps: 1,
        dt: 1e-3,
        field: LinearField { p: [1.0, 0.0, 0.0], ..LinearField::default() },
        expected: ExpectedResult {
            shell_size: None,
            churn: None,
            force: Some(ForceCheck { expected: [0.0, 0.0], tolerance: 1e-9 }),
            stencil_coverage: true,
        },
    }
}

/// All reference tests, with case files resolved by `resolve`
pub fn all_tests(resolve: impl Fn(&str) -> String) -> Vec<ReferenceTest> {
    vec![
        static_cylinder_test(resolve("configs/static-cylinder.json")),
        translating_cylinder_test(resolve("configs/translating-cylinder.json")),
        pressure_load_test(resolve("configs/pressure-load.json")),
        direct_forcing_square_test(resolve("configs/direct-forcing-square.json")),
    ]
}
