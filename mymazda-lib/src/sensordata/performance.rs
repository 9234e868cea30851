use rand::Rng;

/// Results of the synthetic on-device benchmarks.
///
/// Generated once per generator instance, so every request from one client
/// reports the same "device speed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceTestResults {
    pub mod_test_result: u32,
    pub mod_test_iterations: u32,
    pub float_test_result: u32,
    pub float_test_iterations: u32,
    pub sqrt_test_result: u32,
    pub sqrt_test_iterations: u32,
    pub trig_test_result: u32,
    pub trig_test_iterations: u32,
    pub loop_test_result: u32,
}

impl PerformanceTestResults {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mod_test_iterations = rng.gen_range(350..600);
        let float_test_iterations = rng.gen_range(563..2000);
        let sqrt_test_iterations = rng.gen_range(500..1500);
        let trig_test_iterations = rng.gen_range(500..1500);

        Self {
            mod_test_result: 16,
            mod_test_iterations,
            float_test_result: 59,
            float_test_iterations,
            sqrt_test_result: sqrt_test_iterations * 7 / 10,
            sqrt_test_iterations,
            trig_test_result: trig_test_iterations * 3 / 5,
            trig_test_iterations,
            loop_test_result: rng.gen_range(8500..16000),
        }
    }
}

impl std::fmt::Display for PerformanceTestResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            self.mod_test_result,
            self.mod_test_iterations,
            self.float_test_result,
            self.float_test_iterations,
            self.sqrt_test_result,
            self.sqrt_test_iterations,
            self.trig_test_result,
            self.trig_test_iterations,
            self.loop_test_result
        )
    }
}
