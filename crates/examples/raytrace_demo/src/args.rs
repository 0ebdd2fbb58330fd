use std::path::PathBuf;

use app::{TracingPath, TracingRequest};
use clap::Parser;

/// Ray traced floating statue demo
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// Trace with ray queries from a compute shader
    #[clap(long, alias = "FL", conflicts_with = "pipeline")]
    pub force_compute: bool,

    /// Require the ray tracing pipeline
    #[clap(long, alias = "DXR")]
    pub pipeline: bool,

    #[clap(long, default_value_t = 1280)]
    pub width: u32,

    #[clap(long, default_value_t = 720)]
    pub height: u32,

    /// Extra directory searched for shaders, textures, meshes and fonts
    #[clap(long, value_name = "DIR")]
    pub assets: Option<String>,
}

impl Args {
    pub fn tracing_request(&self) -> TracingRequest {
        if self.force_compute {
            TracingRequest::Require(TracingPath::RayQuery)
        } else if self.pipeline {
            TracingRequest::Require(TracingPath::Pipeline)
        } else {
            TracingRequest::Auto
        }
    }

    /// The `--assets` directory with `~` and environment variables expanded.
    pub fn assets_dir(&self) -> Option<PathBuf> {
        let dir = self.assets.as_deref()?;
        match shellexpand::full(dir) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(err) => {
                log::warn!("Using --assets as given: {err}");
                Some(PathBuf::from(dir))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("raytrace-demo").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let args = parse(&[]).unwrap();

        assert_eq!(args.width, 1280);
        assert_eq!(args.height, 720);
        assert_eq!(args.tracing_request(), TracingRequest::Auto);
        assert!(args.assets_dir().is_none());
    }

    #[test]
    fn backend_flags_and_aliases() {
        for flag in ["--force-compute", "--FL"] {
            assert_eq!(
                parse(&[flag]).unwrap().tracing_request(),
                TracingRequest::Require(TracingPath::RayQuery)
            );
        }
        for flag in ["--pipeline", "--DXR"] {
            assert_eq!(
                parse(&[flag]).unwrap().tracing_request(),
                TracingRequest::Require(TracingPath::Pipeline)
            );
        }
    }

    #[test]
    fn backend_flags_conflict() {
        assert!(parse(&["--force-compute", "--pipeline"]).is_err());
    }

    #[test]
    fn size_and_assets() {
        let args = parse(&["--width", "640", "--height", "480", "--assets", "/opt/demo"]).unwrap();

        assert_eq!((args.width, args.height), (640, 480));
        assert_eq!(args.assets_dir(), Some(PathBuf::from("/opt/demo")));
    }

    #[test]
    fn assets_expand_environment() {
        std::env::set_var("RAYTRACE_DEMO_TEST_ROOT", "/srv/assets");
        let args = parse(&["--assets", "$RAYTRACE_DEMO_TEST_ROOT/extra"]).unwrap();

        assert_eq!(args.assets_dir(), Some(PathBuf::from("/srv/assets/extra")));
    }
}
