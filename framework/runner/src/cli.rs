use clap::{Parser, ValueEnum};

use crate::ramp::Stage;

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct LoadTunnelScenarioCli {
    /// A connection string for the service to test.
    ///
    /// How this is interpreted is up to the scenario binding. For HTTP scenarios it is the base
    /// URL of the service and takes precedence over the `BASE_URL` environment variable.
    #[clap(short, long)]
    pub connection_string: Option<String>,

    /// The number of agents to run at a constant rate.
    ///
    /// Ignored when stages are given on the command line.
    #[clap(long)]
    pub agents: Option<usize>,

    /// Assign a behaviour to a number of agents. Specify the behaviour and number of agents to assign
    /// it to in the format `behaviour:count`. For example `--behaviour=login:5`.
    ///
    /// Specifying the count is optional and will default to 1.
    ///
    /// You can specify multiple behaviours by using the flag multiple times. For example `--behaviour=add_to_list:5 --behaviour=favourite_items:5`.
    ///
    /// For however many agents you assign to behaviours in total, it must be less than or equal to the peak number of agents for this scenario.
    /// If it is less than the peak number of agents then the remaining agents will be assigned the default behaviour.
    /// Agents are activated in the order their behaviours are given, so while ramping up the first behaviour gets agents first.
    ///
    /// If the configuration is invalid then the scenario will fail to start.
    #[clap(long, short, value_parser = parse_agent_behaviour)]
    pub behaviour: Vec<(String, usize)>,

    /// The number of seconds to run the scenario for at a constant number of agents
    #[clap(long)]
    pub duration: Option<u64>,

    /// A stage of the load ramp in the format `<duration>:<target>`, for example `--stage 10s:50`.
    ///
    /// Repeat the flag to build a schedule. During each stage the number of agents moves linearly
    /// from the previous target to the stage target. Overrides the scenario's default stages.
    #[clap(long = "stage", value_parser = clap::value_parser!(Stage))]
    pub stages: Vec<Stage>,

    /// The number of agents to start with before the first stage
    #[clap(long, default_value = "0")]
    pub start_agents: usize,

    /// Run this test as a soak test, continuing to run at the final target until stopped
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Set the ID of this run
    ///
    /// If not set, a random ID is used.
    #[arg(long, short)]
    pub run_id: Option<String>,

    /// Print the run summary as JSON to stdout when the run completes
    #[clap(long, default_value = "false")]
    pub summary_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep all records in memory and print summary tables at the end of the run.
    InMemory,
    /// Only aggregate metrics for thresholds, print nothing.
    Noop,
}

pub fn parse_agent_behaviour(s: &str) -> anyhow::Result<(String, usize)> {
    let mut parts = s.split(':');
    let name = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(anyhow::anyhow!("No name specified for behaviour"))?;

    let count = match parts.next() {
        Some(count) => count
            .trim()
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid count for behaviour {}: {}", name, e))?,
        None => 1,
    };

    Ok((name, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn behaviour_count_defaults_to_one() {
        assert_eq!(
            ("login".to_string(), 1),
            parse_agent_behaviour("login").unwrap()
        );
        assert_eq!(
            ("login".to_string(), 5),
            parse_agent_behaviour("login:5").unwrap()
        );
    }

    #[test]
    fn behaviour_requires_name_and_valid_count() {
        assert!(parse_agent_behaviour("").is_err());
        assert!(parse_agent_behaviour(":3").is_err());
        assert!(parse_agent_behaviour("login:many").is_err());
    }

    #[test]
    fn parse_stages_from_args() {
        let cli = LoadTunnelScenarioCli::parse_from([
            "points_redeem",
            "--stage",
            "10s:10",
            "--stage",
            "20s:50",
            "--no-progress",
            "--reporter",
            "noop",
        ]);

        assert_eq!(
            vec![
                Stage::new(Duration::from_secs(10), 10),
                Stage::new(Duration::from_secs(20), 50)
            ],
            cli.stages
        );
        assert!(cli.no_progress);
        assert_eq!(ReporterOpt::Noop, cli.reporter);
        assert_eq!(None, cli.connection_string);
    }

    #[test]
    fn invalid_stage_is_rejected() {
        let result = LoadTunnelScenarioCli::try_parse_from(["points_redeem", "--stage", "10s"]);
        assert!(result.is_err());
    }
}
