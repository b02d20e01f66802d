//! Composition planning.
//!
//! A job renders in stages: one encode per scene, a stream-copy concat of the
//! clips, then optional audio mix and subtitle burn-in passes. Every clip is
//! encoded with the same parameters, which is what lets the concat stage
//! copy streams instead of re-encoding.

use std::fmt;
use std::path::{Path, PathBuf};

use reel_models::{CanonicalFormat, EncodingConfig, MixDuration};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};

/// Relative gain applied to background music.
pub const MUSIC_GAIN: f64 = 0.2;

/// Subtitle font size.
pub const SUBTITLE_FONT_SIZE: u32 = 18;
/// Subtitle vertical margin in pixels.
pub const SUBTITLE_MARGIN_V: u32 = 40;
/// ASS alignment 2 = bottom centre.
pub const SUBTITLE_ALIGNMENT: u32 = 2;

/// A scene ready for planning: local files and measured duration.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedScene {
    pub image: PathBuf,
    pub narration: PathBuf,
    pub duration: f64,
}

/// Everything the planner needs for one job.
#[derive(Debug, Clone)]
pub struct PlanInput<'a> {
    pub scenes: &'a [PlannedScene],
    pub format: CanonicalFormat,
    pub music: Option<&'a Path>,
    /// Already-sanitized SRT file
    pub subtitles: Option<&'a Path>,
    pub mix_duration: MixDuration,
    pub encoding: &'a EncodingConfig,
    /// Directory for intermediate artifacts
    pub work_dir: &'a Path,
    /// Final render artifact
    pub output: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    SceneClip { index: usize },
    Concat,
    AudioMix,
    SubtitleBurn,
}

impl StageKind {
    /// Stage label without the scene index, for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::SceneClip { .. } => "clip",
            StageKind::Concat => "concat",
            StageKind::AudioMix => "mix",
            StageKind::SubtitleBurn => "subtitles",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::SceneClip { index } => write!(f, "clip-{}", index),
            StageKind::Concat => f.write_str("concat"),
            StageKind::AudioMix => f.write_str("mix"),
            StageKind::SubtitleBurn => f.write_str("subtitles"),
        }
    }
}

/// A file that must be written before a stage runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StageManifest {
    pub path: PathBuf,
    pub contents: String,
}

/// One step of the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub kind: StageKind,
    /// Artifacts consumed
    pub inputs: Vec<PathBuf>,
    /// Artifact produced
    pub output: PathBuf,
    /// Concat list for the concat stage
    pub manifest: Option<StageManifest>,
    pub command: FfmpegCommand,
}

/// Ordered stages of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    stages: Vec<Stage>,
    scene_count: usize,
}

impl StagePlan {
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Per-scene clip stages; independent of each other.
    pub fn clip_stages(&self) -> &[Stage] {
        &self.stages[..self.scene_count]
    }

    /// Stages after the clips, to be run strictly in order.
    pub fn sequential_stages(&self) -> &[Stage] {
        &self.stages[self.scene_count..]
    }

    /// Output of the last stage.
    pub fn final_output(&self) -> &Path {
        // plans always hold the clip stages and a concat stage
        &self.stages[self.stages.len() - 1].output
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Build the stage list for a job.
pub fn plan_composition(input: &PlanInput<'_>) -> MediaResult<StagePlan> {
    if input.scenes.is_empty() {
        return Err(MediaError::internal("cannot plan a composition without scenes"));
    }
    if let Some((idx, scene)) = input
        .scenes
        .iter()
        .enumerate()
        .find(|(_, s)| !(s.duration.is_finite() && s.duration > 0.0))
    {
        return Err(MediaError::internal(format!(
            "scene {} has invalid duration {}",
            idx, scene.duration
        )));
    }

    let mut stages = Vec::with_capacity(input.scenes.len() + 3);

    let clips: Vec<PathBuf> = input
        .scenes
        .iter()
        .enumerate()
        .map(|(index, scene)| {
            let output = input.work_dir.join(format!("clip_{:03}.mp4", index));
            stages.push(scene_clip_stage(index, scene, input, &output));
            output
        })
        .collect();

    let has_mix = input.music.is_some();
    let has_subtitles = input.subtitles.is_some();

    let concat_out = if has_mix || has_subtitles {
        input.work_dir.join("concat.mp4")
    } else {
        input.output.to_path_buf()
    };
    stages.push(concat_stage(&clips, input.work_dir, &concat_out));
    let mut current = concat_out;

    if let Some(music) = input.music {
        let mix_out = if has_subtitles {
            input.work_dir.join("mixed.mp4")
        } else {
            input.output.to_path_buf()
        };
        stages.push(mix_stage(&current, music, input, &mix_out));
        current = mix_out;
    }

    if let Some(subtitles) = input.subtitles {
        stages.push(subtitle_stage(&current, subtitles, input, input.output));
    }

    check_outputs(&stages)?;

    Ok(StagePlan {
        stages,
        scene_count: input.scenes.len(),
    })
}

/// Every stage must write a file of its own that nothing it reads aliases.
fn check_outputs(stages: &[Stage]) -> MediaResult<()> {
    for (idx, stage) in stages.iter().enumerate() {
        let reads_own_output = stage.inputs.contains(&stage.output)
            || stage
                .manifest
                .as_ref()
                .is_some_and(|m| m.path == stage.output);
        if reads_own_output {
            return Err(MediaError::internal(format!(
                "{} stage would overwrite its own input {}",
                stage.kind,
                stage.output.display()
            )));
        }
        if let Some(other) = stages[..idx].iter().find(|s| s.output == stage.output) {
            return Err(MediaError::internal(format!(
                "{} stage would overwrite the {} output {}",
                stage.kind,
                other.kind,
                stage.output.display()
            )));
        }
    }
    Ok(())
}

fn scale_pad_filter(format: CanonicalFormat, pixel_format: &str) -> String {
    let (w, h) = format.dimensions();
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,format={pix}",
        w = w,
        h = h,
        pix = pixel_format
    )
}

fn scene_clip_stage(
    index: usize,
    scene: &PlannedScene,
    input: &PlanInput<'_>,
    output: &Path,
) -> Stage {
    let duration = format!("{:.3}", scene.duration);
    let command = FfmpegCommand::new(output)
        .input_with(
            [
                "-loop".to_string(),
                "1".to_string(),
                "-framerate".to_string(),
                input.encoding.frame_rate.to_string(),
                "-t".to_string(),
                duration,
            ],
            &scene.image,
        )
        .input(&scene.narration)
        .video_filter(scale_pad_filter(input.format, &input.encoding.pixel_format))
        .map("0:v:0")
        .map("1:a:0")
        .output_args(input.encoding.video_args())
        .output_args(input.encoding.audio_args())
        .duration(scene.duration)
        .faststart();

    Stage {
        kind: StageKind::SceneClip { index },
        inputs: vec![scene.image.clone(), scene.narration.clone()],
        output: output.to_path_buf(),
        manifest: None,
        command,
    }
}

fn concat_stage(clips: &[PathBuf], work_dir: &Path, output: &Path) -> Stage {
    let list_path = work_dir.join("concat.txt");
    let contents: String = clips
        .iter()
        .map(|clip| format!("file '{}'\n", escape_concat_path(clip)))
        .collect();

    let command = FfmpegCommand::new(output)
        .input_with(["-f", "concat", "-safe", "0"], &list_path)
        .map("0")
        .codec_copy()
        .faststart();

    Stage {
        kind: StageKind::Concat,
        inputs: clips.to_vec(),
        output: output.to_path_buf(),
        manifest: Some(StageManifest {
            path: list_path,
            contents,
        }),
        command,
    }
}

fn mix_stage(video: &Path, music: &Path, input: &PlanInput<'_>, output: &Path) -> Stage {
    let mix = format!(
        "[1:a]volume={gain}[music];[0:a][music]amix=inputs=2:duration={duration}:dropout_transition=0:normalize=0[aout]",
        gain = MUSIC_GAIN,
        duration = input.mix_duration.as_amix_arg()
    );

    let command = match input.mix_duration {
        // music loops forever; amix stops with the narration and the video is copied
        MixDuration::First => FfmpegCommand::new(output)
            .input(video)
            .input_with(["-stream_loop", "-1"], music)
            .filter_complex(mix)
            .map("0:v:0")
            .map("[aout]")
            .video_codec("copy")
            .output_args(input.encoding.audio_args()),
        // music plays once; the last frame is held until the longer track ends
        MixDuration::Longest => FfmpegCommand::new(output)
            .input(video)
            .input(music)
            .filter_complex(format!("[0:v]tpad=stop_mode=clone:stop=-1[vout];{}", mix))
            .map("[vout]")
            .map("[aout]")
            .output_args(input.encoding.video_args())
            .output_args(input.encoding.audio_args())
            .output_arg("-shortest"),
    }
    .faststart();

    Stage {
        kind: StageKind::AudioMix,
        inputs: vec![video.to_path_buf(), music.to_path_buf()],
        output: output.to_path_buf(),
        manifest: None,
        command,
    }
}

fn subtitle_stage(video: &Path, subtitles: &Path, input: &PlanInput<'_>, output: &Path) -> Stage {
    let filter = format!(
        "subtitles=filename={}:force_style='FontSize={},MarginV={},Alignment={}'",
        escape_filter_path(subtitles),
        SUBTITLE_FONT_SIZE,
        SUBTITLE_MARGIN_V,
        SUBTITLE_ALIGNMENT
    );

    let command = FfmpegCommand::new(output)
        .input(video)
        .video_filter(filter)
        .map("0:v:0")
        .map("0:a:0")
        .output_args(input.encoding.video_args())
        .audio_codec("copy")
        .faststart();

    Stage {
        kind: StageKind::SubtitleBurn,
        inputs: vec![video.to_path_buf(), subtitles.to_path_buf()],
        output: output.to_path_buf(),
        manifest: None,
        command,
    }
}

/// Quote a path for a concat demuxer `file '...'` line.
fn escape_concat_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "'\\''")
}

/// Escape a path used as a filter option value inside a filtergraph.
///
/// Two levels apply: the option value (`\ ' :`) and then the filtergraph
/// (`\ ' [ ] , ;`).
pub fn escape_filter_path(path: &Path) -> String {
    let mut value = String::new();
    for c in path.to_string_lossy().chars() {
        if matches!(c, '\\' | '\'' | ':') {
            value.push('\\');
        }
        value.push(c);
    }

    let mut graph = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            graph.push('\\');
        }
        graph.push(c);
    }
    graph
}
