//! Renders a few seconds of a dense granular texture offline and writes the
//! result to `grains.wav` in the current working directory.

use granule::{
    envelope::{AmpEnv, DurEnv, FreqEnv},
    GrainScheduler, GrainSource, SpawnParams,
};

// -------------------------------------------------------------------------------------------------

const SAMPLE_RATE: u32 = 44100;
const BLOCK_SIZE: usize = 512;
const RENDER_SECONDS: usize = 4;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    // one cycle of a sine as shared grain material: grains then pitch it by
    // reading it back at different rates
    let frames: Vec<f32> = (0..1024)
        .map(|frame| (frame as f32 / 1024.0 * std::f32::consts::TAU).sin())
        .collect();
    let source = GrainSource::from_frames(frames)?;

    let mut scheduler = GrainScheduler::new(32, 2)?;
    let control = scheduler.control();

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create("grains.wav", spec)?;

    log::info!("Rendering {RENDER_SECONDS} seconds of grains...");

    let block_count = SAMPLE_RATE as usize * RENDER_SECONDS / BLOCK_SIZE;
    let mut block = vec![0.0f32; 2 * BLOCK_SIZE];
    let mut spawned = 0u32;
    for block_index in 0..block_count {
        // spawn a new grain every few blocks, cycling through a small set of
        // rates and panning positions
        if block_index % 3 == 0 {
            let step = block_index / 3;
            let rate = [0.5, 0.75, 1.0, 1.5, 2.0][step % 5];
            let panning = [-0.8, -0.3, 0.0, 0.3, 0.8][(step * 3) % 5];
            let params = SpawnParams::new(source.clone())
                .amp_env(AmpEnv::with_curve(4096, 2048, 0.6, 8192, 2.0)?)
                .freq_env(FreqEnv::new(rate * 0.5, rate, rate, rate * 0.5)?)
                .dur_env(DurEnv::ticks(SAMPLE_RATE / 2))
                .gain(0.2)
                .panning(panning);
            control.spawn(params)?;
            spawned += 1;
        }
        scheduler.process(&mut block);
        for sample in &block {
            writer.write_sample(*sample)?;
        }
    }

    // let the remaining grains ring out
    control.release_all()?;
    while scheduler.live_grains() > 0 {
        scheduler.process(&mut block);
        for sample in &block {
            writer.write_sample(*sample)?;
        }
    }
    writer.finalize()?;

    log::info!(
        "Done: spawned {} grains, dropped {} (peak polyphony {})",
        spawned,
        control.dropped_spawns(),
        control.slot_count()
    );
    Ok(())
}
