use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use voicebot::bot::{
    ConsoleInput, ConsoleOutput, VoiceInput, VoiceOutput, Voicebot, agent_from_config,
};
use voicebot::config::{LoggingConfig, SpeechConfig};
use voicebot::mcp::McpClient;
use voicebot::voice::{
    AudioCapture, AudioPlayback, DecodedAudio, MicrophoneListener, Synthesizer, Transcriber,
    calculate_energy, list_devices,
};
use voicebot::{Config, Emotion, Listen, Speak};

/// Voicebot - an emotional voice assistant
#[derive(Parser)]
#[command(name = "voicebot", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "VOICEBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Converse over stdin/stdout instead of the microphone and speakers
    #[arg(long)]
    text: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// List audio input and output devices
    Devices,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
        /// Emotion to speak with
        #[arg(short, long, default_value = "neutral")]
        emotion: String,
    },
    /// Record one phrase and print its transcript
    TranscribeTest {
        /// Seconds to wait for speech to start
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let (config, file_status) = match Config::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("fatal: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(cli.verbose, &config.logging) {
        eprintln!("fatal: {e}");
        return ExitCode::FAILURE;
    }
    file_status.log();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Console logging plus an optional append-only log file
fn init_logging(verbose: u8, logging: &LoggingConfig) -> anyhow::Result<()> {
    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match verbose {
        0 => logging.level.clone(),
        1 => "info,voicebot=debug".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Devices => devices(),
            Command::TestMic { duration } => test_mic(&config, duration).await,
            Command::TestSpeaker => test_speaker(&config).await,
            Command::TestTts { text, emotion } => test_tts(&config, &text, &emotion).await,
            Command::TranscribeTest { duration } => transcribe_test(&config, duration).await,
        };
    }

    tracing::debug!(?config, "loaded configuration");

    if cli.text {
        tracing::info!("starting voicebot in text mode");
        let agent = agent_from_config(&config)?;
        let mcp = McpClient::new(&config.mcp)?;
        let bot = Voicebot::new(ConsoleInput::stdin(), ConsoleOutput::stdout(), agent, mcp);
        converse(bot).await;
        return Ok(());
    }

    let missing = config.missing_api_keys();
    if !missing.is_empty() {
        anyhow::bail!("missing required API keys: {}", missing.join(", "));
    }

    let agent = agent_from_config(&config)?;
    let mcp = McpClient::new(&config.mcp)?;

    let listener = MicrophoneListener::new(&config.speech, &config.audio)?;
    let input = VoiceInput::new(listener, Transcriber::from_config(&config));
    let output = VoiceOutput::new(
        Synthesizer::from_config(&config),
        AudioPlayback::new(&config.audio),
    );

    tracing::info!(
        engine = ?config.speech.engine,
        language = %config.speech.language,
        mcp = %config.mcp.endpoint,
        "voicebot ready"
    );
    converse(Voicebot::new(input, output, agent, mcp)).await;

    Ok(())
}

/// Run until interrupted or the input ends, then shut down cleanly
#[allow(clippy::future_not_send)]
async fn converse<L: Listen, S: Speak>(mut bot: Voicebot<L, S>) {
    bot.start().await;
    bot.stop().await;
}

/// List audio devices
fn devices() -> anyhow::Result<()> {
    let devices = list_devices()?;

    println!("Input devices:");
    for device in &devices.inputs {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("  {}{marker}", device.name);
    }

    println!("\nOutput devices:");
    for device in &devices.outputs {
        let marker = if device.is_default { " (default)" } else { "" };
        println!("  {}{marker}", device.name);
    }

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new(
        config.audio.input_device.as_deref(),
        config.speech.sample_rate,
    )?;
    capture.start()?;

    let sample_rate = capture.sample_rate();
    println!("Sample rate: {sample_rate} Hz");
    println!("Speech threshold: {:.4}", config.speech.energy_threshold);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.peek_buffer();
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        capture.clear_buffer();
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: voicebot devices");
    println!("  3. Set audio.input_device in the config file");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker(config: &Config) -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new(&config.audio);

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback
        .play(DecodedAudio {
            samples,
            sample_rate,
        })
        .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, run `voicebot devices` and set audio.output_device");

    Ok(())
}

/// Test emotional TTS output
async fn test_tts(config: &Config, text: &str, emotion: &str) -> anyhow::Result<()> {
    let emotion = Emotion::resolve(Some(emotion));
    println!("Testing TTS with text: \"{text}\" ({emotion})\n");

    let synthesizer = Synthesizer::from_config(config);
    println!("Providers: {:?}", synthesizer.providers());

    println!("Synthesizing speech...");
    let mp3_data = synthesizer
        .synthesize(text, emotion)
        .await
        .ok_or_else(|| anyhow::anyhow!("TTS synthesis failed with every provider"))?;
    println!("Got {} bytes of audio data", mp3_data.len());

    if mp3_data.len() > 3 {
        println!(
            "First 4 bytes: {:02x} {:02x} {:02x} {:02x}",
            mp3_data[0], mp3_data[1], mp3_data[2], mp3_data[3]
        );
    }

    println!("Playing audio...");
    AudioPlayback::new(&config.audio).play_mp3(&mp3_data).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Record one phrase and transcribe it
#[allow(clippy::future_not_send)]
async fn transcribe_test(config: &Config, duration: u64) -> anyhow::Result<()> {
    let transcriber = Transcriber::from_config(config);
    println!("Providers: {:?}", transcriber.providers());

    let speech = SpeechConfig {
        timeout: Duration::from_secs(duration),
        ..config.speech.clone()
    };
    let mut listener = MicrophoneListener::new(&speech, &config.audio)?;
    let threshold = listener.calibrate().await?;
    println!("Speech threshold: {threshold:.4}");
    println!("Say something...");

    let Some(wav) = listener.listen().await? else {
        listener.stop();
        println!("No speech detected");
        return Ok(());
    };
    listener.stop();
    println!("Captured {} bytes at {} Hz", wav.len(), listener.sample_rate());

    match transcriber.transcribe(&wav).await {
        Some(text) => println!("Transcript: {text}"),
        None => println!("Transcription failed"),
    }

    Ok(())
}
