use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{RunConfig, ToolPaths};
use crate::contract::{CommandFailure, Stage, StageError, ToolCommand, ToolRunner};
use crate::paths::RoundtripPaths;
use crate::record::{CompressionSample, FileRecord, RunResults, fractional_mb, whole_mb};
use crate::timing::{TimingStats, time_runs};

/// Metrics requested from the comparator, in report column order.
pub const COMPARE_METRICS: &str = "mse,nrmse";

/// Builds the argv of every external invocation.
#[derive(Debug, Clone)]
pub struct Toolchain {
    tools: ToolPaths,
    codec_args: Vec<String>,
}

impl Toolchain {
    #[must_use]
    pub fn new(tools: ToolPaths, codec_args: &str) -> Self {
        Self {
            tools,
            codec_args: codec_args.split_whitespace().map(str::to_string).collect(),
        }
    }

    #[must_use]
    pub fn convert(&self, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.tools.sqy)
            .arg("convert")
            .arg(input)
            .arg(output)
    }

    #[must_use]
    pub fn compress(&self, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.tools.x265)
            .args(&self.codec_args)
            .arg(input)
            .arg(output)
    }

    #[must_use]
    pub fn decompress(&self, input: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.tools.ffmpeg)
            .args(["-y", "-i"])
            .arg(input)
            .arg(output)
    }

    #[must_use]
    pub fn compare(&self, reconstructed: &Path, original: &Path) -> ToolCommand {
        ToolCommand::new(&self.tools.sqy)
            .args(["compare", "-m", COMPARE_METRICS])
            .arg(reconstructed)
            .arg(original)
    }
}

/// Parse the comparator's whitespace-separated numbers, all or nothing.
pub fn parse_metrics(stdout: &str) -> Result<Vec<f64>, CommandFailure> {
    stdout
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| CommandFailure::InvalidMetric(token.to_string()))
        })
        .collect()
}

/// Runs the convert / compress / decompress / convert / compare chain per file.
pub struct RoundtripPipeline<R> {
    runner: R,
    toolchain: Toolchain,
    shorthand: String,
    compress_runs: usize,
}

impl<R: ToolRunner> RoundtripPipeline<R> {
    #[must_use]
    pub fn new(config: &RunConfig, runner: R) -> Self {
        Self::with_toolchain(
            Toolchain::new(config.tools().clone(), config.codec_args()),
            config.shorthand(),
            config.compress_runs(),
            runner,
        )
    }

    #[must_use]
    pub fn with_toolchain(
        toolchain: Toolchain,
        shorthand: &str,
        compress_runs: usize,
        runner: R,
    ) -> Self {
        Self {
            runner,
            toolchain,
            shorthand: shorthand.to_string(),
            compress_runs: compress_runs.max(1),
        }
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Process every input in order; a failing file never stops the run.
    pub fn run<P: AsRef<Path>>(&mut self, inputs: &[P]) -> RunResults {
        let mut results = RunResults::new();
        for input in inputs {
            let input = input.as_ref();
            let record = self.process_file(input);
            results.insert(input.to_path_buf(), record);
        }
        info!(
            files = results.len(),
            completed = results.completed(),
            "roundtrip finished"
        );
        results
    }

    /// Returns the record as far as the file got; failures are logged, not returned.
    pub fn process_file(&mut self, input: &Path) -> FileRecord {
        info!(input = %input.display(), shorthand = %self.shorthand, "processing");
        let mut record = FileRecord::NotStarted;
        if let Err(err) = self.advance(input, &mut record) {
            warn!(input = %input.display(), stage = %err.stage(), "{err}");
        }
        debug!(
            input = %input.display(),
            state = record.state_name(),
            fields = record.field_count(),
            "record finalized"
        );
        record
    }

    fn advance(&mut self, input: &Path, record: &mut FileRecord) -> Result<(), StageError> {
        let paths = RoundtripPaths::new(input, &self.shorthand);

        if paths.intermediate.exists() {
            debug!(intermediate = %paths.intermediate.display(), "reusing intermediate");
        } else {
            let command = self.toolchain.convert(&paths.input, &paths.intermediate);
            self.runner
                .run(&command)
                .map_err(|failure| StageError::command(Stage::Convert, &command, failure))?;
        }
        *record = FileRecord::Converted;

        let original_mb = whole_mb(file_len(Stage::Measure, &paths.input)?);
        *record = FileRecord::Sized { original_mb };
        fs::copy(&paths.lookup, &paths.tagged_lookup).map_err(|source| {
            StageError::io(
                Stage::Measure,
                format!(
                    "copy {} -> {}",
                    paths.lookup.display(),
                    paths.tagged_lookup.display()
                ),
                source,
            )
        })?;

        let command = self.toolchain.compress(&paths.intermediate, &paths.bitstream);
        let samples = time_runs(&mut self.runner, &command, self.compress_runs)
            .map_err(|failure| StageError::command(Stage::Compress, &command, failure))?;
        let sample = CompressionSample {
            original_mb,
            compressed_mb: fractional_mb(file_len(Stage::Compress, &paths.bitstream)?),
            seconds: TimingStats::from_samples(samples.seconds()).mean,
        };
        *record = FileRecord::Compressed(sample);

        let command = self
            .toolchain
            .decompress(&paths.bitstream, &paths.roundtrip_intermediate);
        self.runner
            .run(&command)
            .map_err(|failure| StageError::command(Stage::Decompress, &command, failure))?;
        *record = FileRecord::Decompressed(sample);

        let command = self
            .toolchain
            .convert(&paths.roundtrip_intermediate, &paths.roundtrip_image);
        self.runner
            .run(&command)
            .map_err(|failure| StageError::command(Stage::RoundTripConvert, &command, failure))?;
        *record = FileRecord::RoundTripped(sample);

        let command = self.toolchain.compare(&paths.roundtrip_image, &paths.input);
        let metrics = self
            .runner
            .capture(&command)
            .and_then(|stdout| parse_metrics(&stdout))
            .map_err(|failure| StageError::command(Stage::Compare, &command, failure))?;
        *record = FileRecord::Compared {
            sample,
            metrics,
            shorthand: self.shorthand.clone(),
        };
        Ok(())
    }
}

fn file_len(stage: Stage, path: &Path) -> Result<u64, StageError> {
    fs::metadata(path)
        .map(|meta| meta.len())
        .map_err(|source| StageError::io(stage, format!("stat {}", path.display()), source))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    const MB: usize = 1024 * 1024;

    /// Stands in for sqy/x265/ffmpeg by writing the files they would write.
    #[derive(Default)]
    struct FakeRunner {
        calls: Vec<String>,
        fail_program: Option<&'static str>,
        fail_verb: Option<&'static str>,
        compare_stdout: String,
        bitstream_bytes: usize,
    }

    impl FakeRunner {
        fn new() -> Self {
            Self {
                compare_stdout: "10.5 0.02\n".to_string(),
                bitstream_bytes: MB / 2,
                ..Self::default()
            }
        }

        fn failing(program: &'static str, verb: Option<&'static str>) -> Self {
            Self {
                fail_program: Some(program),
                fail_verb: verb,
                ..Self::new()
            }
        }

        fn should_fail(&self, command: &ToolCommand) -> bool {
            let program_matches = self.fail_program == Some(program_name(command).as_str());
            let verb_matches = match self.fail_verb {
                Some(verb) => command.args.first().is_some_and(|arg| arg == verb),
                None => true,
            };
            program_matches && verb_matches
        }

        fn invoke(&mut self, command: &ToolCommand) -> Result<(), CommandFailure> {
            self.calls.push(command.to_string());
            if self.should_fail(command) {
                return Err(CommandFailure::Spawn(std::io::Error::other("fake failure")));
            }
            let output = output_of(command);
            match program_name(command).as_str() {
                "sqy" if command.args[0] == "convert" => {
                    let input = PathBuf::from(&command.args[1]);
                    fs::copy(&input, &output).map_err(CommandFailure::Spawn)?;
                    if output.extension().is_some_and(|ext| ext == "y4m") {
                        fs::write(output.with_extension("lut"), b"lut").unwrap();
                    }
                }
                "x265" => fs::write(&output, vec![0u8; self.bitstream_bytes]).unwrap(),
                "ffmpeg" => {
                    let input = PathBuf::from(&command.args[2]);
                    fs::copy(&input, &output).map_err(CommandFailure::Spawn)?;
                }
                _ => {}
            }
            Ok(())
        }
    }

    impl ToolRunner for FakeRunner {
        fn run(&mut self, command: &ToolCommand) -> Result<(), CommandFailure> {
            self.invoke(command)
        }

        fn capture(&mut self, command: &ToolCommand) -> Result<String, CommandFailure> {
            self.invoke(command)?;
            if command.args.first().is_some_and(|arg| arg == "compare") {
                return Ok(self.compare_stdout.clone());
            }
            Ok(String::new())
        }
    }

    fn program_name(command: &ToolCommand) -> String {
        command
            .program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    // Every tool here writes to its last argument.
    fn output_of(command: &ToolCommand) -> PathBuf {
        PathBuf::from(command.args.last().expect("command has an output argument"))
    }

    fn toolchain(codec_args: &str) -> Toolchain {
        Toolchain::new(ToolPaths::default(), codec_args)
    }

    fn pipeline(runner: FakeRunner, compress_runs: usize) -> RoundtripPipeline<FakeRunner> {
        RoundtripPipeline::with_toolchain(
            toolchain("--lossless --preset ultrafast"),
            "_lpurt",
            compress_runs,
            runner,
        )
    }

    fn input_file(dir: &TempDir, name: &str, bytes: usize) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, vec![7u8; bytes]).unwrap();
        path
    }

    #[test]
    fn commands_are_explicit_argv_lists() {
        let tc = toolchain("--lossless  --preset ultrafast");
        let input = Path::new("a.tif");
        let y4m = Path::new("a.y4m");
        let hevc = Path::new("a_lpurt.hevc");

        assert_eq!(tc.convert(input, y4m).to_string(), "./sqy convert a.tif a.y4m");
        assert_eq!(
            tc.compress(y4m, hevc).args,
            ["--lossless", "--preset", "ultrafast", "a.y4m", "a_lpurt.hevc"]
                .map(std::ffi::OsString::from)
                .to_vec()
        );
        assert_eq!(
            tc.decompress(hevc, Path::new("a_lpurt.y4m")).to_string(),
            "ffmpeg -y -i a_lpurt.hevc a_lpurt.y4m"
        );
        assert_eq!(
            tc.compare(Path::new("a_lpurt.tif"), input).to_string(),
            "./sqy compare -m mse,nrmse a_lpurt.tif a.tif"
        );
    }

    #[test]
    fn empty_codec_args_add_no_tokens() {
        let tc = toolchain("");
        let command = tc.compress(Path::new("a.y4m"), Path::new("a_drt.hevc"));
        assert_eq!(command.to_string(), "x265 a.y4m a_drt.hevc");
    }

    #[rstest]
    #[case("10.5 0.02\n", vec![10.5, 0.02])]
    #[case("  1e-3\t4\n5.5 ", vec![0.001, 4.0, 5.5])]
    #[case("", vec![])]
    fn parses_metric_tokens(#[case] stdout: &str, #[case] expected: Vec<f64>) {
        assert_eq!(parse_metrics(stdout).unwrap(), expected);
    }

    #[test]
    fn non_numeric_metric_fails_the_whole_parse() {
        let err = parse_metrics("10.5 mse=0.02").unwrap_err();
        assert!(matches!(err, CommandFailure::InvalidMetric(token) if token == "mse=0.02"));
    }

    #[test]
    fn successful_file_reaches_compared() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir, "a.tif", 2 * MB);
        let mut pipeline = pipeline(FakeRunner::new(), 1);

        let record = pipeline.process_file(&input);

        let FileRecord::Compared {
            sample,
            metrics,
            shorthand,
        } = &record
        else {
            panic!("unexpected record: {record:?}");
        };
        assert_eq!(sample.original_mb, 2);
        assert_eq!(sample.compressed_mb, 0.5);
        assert!(sample.seconds >= 0.0);
        assert_eq!(metrics, &vec![10.5, 0.02]);
        assert_eq!(shorthand, "_lpurt");
        assert_eq!(record.field_count(), 6);

        assert!(dir.path().join("a.y4m").exists());
        assert!(dir.path().join("a_lpurt.lut").exists());
        assert!(dir.path().join("a_lpurt.hevc").exists());
        assert!(dir.path().join("a_lpurt.y4m").exists());
        assert!(dir.path().join("a_lpurt.tif").exists());

        let runner = pipeline.into_runner();
        let programs: Vec<&str> = runner
            .calls
            .iter()
            .map(|call| call.split_whitespace().next().unwrap())
            .collect();
        assert_eq!(programs, vec!["./sqy", "x265", "ffmpeg", "./sqy", "./sqy"]);
    }

    #[test]
    fn existing_intermediate_skips_conversion() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir, "a.tif", MB);
        fs::write(dir.path().join("a.y4m"), b"y4m").unwrap();
        fs::write(dir.path().join("a.lut"), b"lut").unwrap();
        let mut pipeline = pipeline(FakeRunner::new(), 1);

        let record = pipeline.process_file(&input);

        assert!(matches!(record, FileRecord::Compared { .. }));
        let runner = pipeline.into_runner();
        assert!(!runner.calls.iter().any(|call| call.ends_with("a.y4m") && call.contains("convert")));
        assert_eq!(runner.calls.len(), 4);
    }

    #[rstest]
    #[case::convert(FakeRunner::failing("sqy", Some("convert")), 0, 1)]
    #[case::compress(FakeRunner::failing("x265", None), 1, 2)]
    #[case::decompress(FakeRunner::failing("ffmpeg", None), 3, 3)]
    #[case::compare(FakeRunner::failing("sqy", Some("compare")), 3, 5)]
    fn failure_truncates_only_that_file(
        #[case] runner: FakeRunner,
        #[case] expected_fields: usize,
        #[case] expected_calls: usize,
    ) {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir, "a.tif", 2 * MB);
        let mut pipeline = pipeline(runner, 1);

        let record = pipeline.process_file(&input);

        assert_eq!(record.field_count(), expected_fields);
        assert_eq!(pipeline.into_runner().calls.len(), expected_calls);
    }

    #[test]
    fn roundtrip_convert_failure_keeps_compression_fields() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir, "a.tif", 2 * MB);
        fs::write(dir.path().join("a.y4m"), b"y4m").unwrap();
        fs::write(dir.path().join("a.lut"), b"lut").unwrap();
        let mut pipeline = pipeline(FakeRunner::failing("sqy", Some("convert")), 1);

        let record = pipeline.process_file(&input);

        assert!(matches!(record, FileRecord::Decompressed(_)));
        assert_eq!(record.field_count(), 3);
    }

    #[test]
    fn garbage_comparator_output_keeps_pre_compare_state() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir, "a.tif", 2 * MB);
        let runner = FakeRunner {
            compare_stdout: "10.5 oops".to_string(),
            ..FakeRunner::new()
        };
        let mut pipeline = pipeline(runner, 1);

        let record = pipeline.process_file(&input);

        assert!(matches!(record, FileRecord::RoundTripped(_)));
    }

    #[test]
    fn missing_lookup_file_stops_after_size() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir, "a.tif", 2 * MB);
        fs::write(dir.path().join("a.y4m"), b"y4m").unwrap();
        let mut pipeline = pipeline(FakeRunner::new(), 1);

        let record = pipeline.process_file(&input);

        assert_eq!(record, FileRecord::Sized { original_mb: 2 });
        assert!(pipeline.into_runner().calls.is_empty());
    }

    #[test]
    fn repeat_timing_runs_the_compressor_n_times() {
        let dir = TempDir::new().unwrap();
        let input = input_file(&dir, "a.tif", MB);
        let mut pipeline = pipeline(FakeRunner::new(), 3);

        let record = pipeline.process_file(&input);

        assert!(matches!(record, FileRecord::Compared { .. }));
        let runner = pipeline.into_runner();
        let compressions = runner
            .calls
            .iter()
            .filter(|call| call.starts_with("x265"))
            .count();
        assert_eq!(compressions, 3);
    }

    #[test]
    fn run_continues_past_failing_files() {
        let dir = TempDir::new().unwrap();
        let good = input_file(&dir, "a.tif", 2 * MB);
        let missing = dir.path().join("missing.tif");
        let mut pipeline = pipeline(FakeRunner::new(), 1);

        let results = pipeline.run(&[missing.clone(), good.clone()]);

        assert_eq!(results.len(), 2);
        assert_eq!(results.completed(), 1);
        assert_eq!(results.get(&missing).map(FileRecord::field_count), Some(0));
        assert_eq!(results.get(&good).map(FileRecord::field_count), Some(6));
    }
}
