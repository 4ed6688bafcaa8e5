//! Interactive session setup
//!
//! Collects every `up` value not given on the command line. Malformed
//! answers are reported and asked again; an empty interface choice ends the
//! run, as does closed input.

use crate::capture::CaptureRequest;
use crate::cli::UpArgs;
use crate::error::{Error, Result};
use crate::lifecycle::{MacChoice, Plan};
use crate::manifest::Config;
use crate::network::bridge;
use crate::network::inventory::Inventory;
use ipnet::IpNet;
use std::io::{self, BufRead, StdinLock, Stdout, Write};
use std::path::PathBuf;

/// Line-oriented question and answer over any reader/writer pair
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<StdinLock<'static>, Stdout> {
    pub fn terminal() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` and read one trimmed answer
    fn ask(&mut self, question: &str) -> Result<String> {
        write!(self.output, "{}", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(Error::InvalidSelection("input closed".to_string()));
        }
        Ok(line.trim().to_string())
    }

    fn complain(&mut self, error: &Error) -> Result<()> {
        writeln!(self.output, "{} - please try again.", error)?;
        Ok(())
    }

    /// Ask until `parse` accepts the answer; input errors are re-asked
    fn ask_until<T, F>(&mut self, question: &str, mut parse: F) -> Result<T>
    where
        F: FnMut(&str) -> Result<T>,
    {
        loop {
            let answer = self.ask(question)?;
            match parse(&answer) {
                Ok(value) => return Ok(value),
                Err(e @ (Error::Validation(_) | Error::InvalidSelection(_))) => self.complain(&e)?,
                Err(e) => return Err(e),
            }
        }
    }

    /// Show the menu and pick an interface by index or name
    ///
    /// `also` names one extra acceptable answer that is not in the inventory
    /// (the bridge, which does not exist yet).
    pub fn interface(
        &mut self,
        inventory: &Inventory,
        label: &str,
        also: Option<&str>,
    ) -> Result<String> {
        writeln!(self.output, "\nAvailable interfaces:")?;
        for (i, name) in inventory.enumerate().iter().enumerate() {
            writeln!(self.output, "  [{}] {}", i, name)?;
        }
        if let Some(extra) = also {
            writeln!(self.output, "  or '{}'", extra)?;
        }

        let question = format!("{} (index or name, ENTER to quit): ", label);
        loop {
            let answer = self.ask(&question)?;
            if answer.is_empty() {
                return Err(Error::InvalidSelection(format!(
                    "no interface chosen for {}",
                    label
                )));
            }
            if also == Some(answer.as_str()) {
                return Ok(answer);
            }
            match inventory.select(&answer) {
                Ok(name) => return Ok(name.to_string()),
                Err(e) => self.complain(&e)?,
            }
        }
    }

    /// Ask for the bridge name; it may not reuse a member's name
    pub fn bridge_name(&mut self, default: &str, members: &[&str]) -> Result<String> {
        let question = format!("Bridge name (default: {}): ", default);
        self.ask_until(&question, |answer| {
            let name = if answer.is_empty() { default } else { answer };
            bridge::validate_name(name)?;
            if members.contains(&name) {
                return Err(Error::Validation(format!(
                    "bridge name '{}' clashes with a member interface",
                    name
                )));
            }
            Ok(name.to_string())
        })
    }

    pub fn mac(&mut self, iface: &str) -> Result<MacChoice> {
        let question = format!(
            "New MAC for {} (e.g. 02:11:22:33:44:55, 'keep', ENTER for random): ",
            iface
        );
        self.ask_until(&question, |answer| answer.parse::<MacChoice>())
    }

    pub fn address(&mut self) -> Result<Option<IpNet>> {
        self.ask_until(
            "Address/prefix for the bridge (e.g. 192.168.1.100/24, ENTER for none): ",
            |answer| {
                if answer.is_empty() {
                    Ok(None)
                } else {
                    bridge::parse_address(answer).map(Some)
                }
            },
        )
    }

    /// Yes/no question; anything but y/yes is no
    pub fn confirm(&mut self, question: &str) -> Result<bool> {
        let answer = self.ask(&format!("{} (y/N): ", question))?;
        Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }

    pub fn capture_file(&mut self) -> Result<Option<PathBuf>> {
        let answer = self.ask("Capture file (ENTER for live output): ")?;
        Ok((!answer.is_empty()).then(|| PathBuf::from(answer)))
    }

    pub fn filter(&mut self, default: &str) -> Result<String> {
        let answer = self.ask(&format!("Capture filter (ENTER for [{}]): ", default))?;
        Ok(if answer.is_empty() { default.to_string() } else { answer })
    }
}

/// Resolve a capture target: the bridge itself or an inventory entry
fn capture_target(inventory: &Inventory, bridge: &str, choice: &str) -> Result<String> {
    if choice.trim() == bridge {
        return Ok(bridge.to_string());
    }
    inventory.select(choice).map(str::to_string)
}

/// Turn command-line values into a plan, asking for whatever is missing
///
/// When both interfaces are given nothing is asked and the remaining values
/// fall back to the configuration defaults.
pub fn build_plan<R: BufRead, W: Write>(
    args: &UpArgs,
    config: &Config,
    inventory: &Inventory,
    prompter: &mut Prompter<R, W>,
) -> Result<Plan> {
    let interactive = !args.is_unattended();
    if inventory.is_empty() {
        return Err(Error::InvalidSelection("no network interfaces found".to_string()));
    }

    let first = match &args.first {
        Some(choice) => inventory.select(choice)?.to_string(),
        None => prompter.interface(inventory, "First interface", None)?,
    };
    let second = match &args.second {
        Some(choice) => inventory.select(choice)?.to_string(),
        None => loop {
            let second = prompter.interface(inventory, "Second interface", None)?;
            if second != first {
                break second;
            }
            prompter.complain(&Error::InvalidSelection(format!(
                "'{}' is already the first interface",
                first
            )))?;
        },
    };

    let bridge = match &args.bridge {
        Some(name) => {
            bridge::validate_name(name)?;
            name.clone()
        }
        None if interactive => {
            prompter.bridge_name(&config.bridge.name, &[first.as_str(), second.as_str()])?
        }
        None => config.bridge.name.clone(),
    };

    let mac = match &args.mac {
        Some(text) => text.parse::<MacChoice>()?,
        None if interactive => prompter.mac(&first)?,
        None => MacChoice::default(),
    };

    let address = match &args.address {
        Some(text) => Some(bridge::parse_address(text)?),
        None if interactive => prompter.address()?,
        None => None,
    };

    let mut plan = Plan::new(first, second, bridge.clone()).mac(mac);
    if let Some(address) = address {
        plan = plan.address(address);
    }

    if !args.monitors.is_empty() {
        if args.capture_file.is_some() && args.monitors.len() > 1 {
            return Err(Error::Validation(
                "--capture-file can only be used with a single --monitor".to_string(),
            ));
        }
        let filter = match &args.filter {
            Some(filter) => filter.clone(),
            None if interactive => prompter.filter(&config.capture.filter)?,
            None => config.capture.filter.clone(),
        };
        for choice in &args.monitors {
            let target = capture_target(inventory, &bridge, choice)?;
            let mut request = CaptureRequest::new(target).filter(filter.clone());
            if let Some(path) = &args.capture_file {
                request = request.destination(path.clone());
            }
            plan = plan.capture(request);
        }
    } else if interactive && prompter.confirm("Start a packet capture?")? {
        let iface = prompter.interface(inventory, "Capture interface", Some(&bridge))?;
        let mut request = CaptureRequest::new(iface);
        if let Some(path) = prompter.capture_file()? {
            request = request.destination(path);
        }
        let filter = match &args.filter {
            Some(filter) => filter.clone(),
            None => prompter.filter(&config.capture.filter)?,
        };
        plan = plan.capture(request.filter(filter));
    }

    plan.validate()?;
    Ok(plan)
}
