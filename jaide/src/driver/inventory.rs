//! Canned reports: device info, health check and interface errors.

use crate::error::{DriverError, Result};
use crate::session::DeviceHandle;
use crate::xml::XmlElement;

/// Interface name fragments inspected by the error scan.
const INTERFACE_TYPES: [&str; 9] = ["ge", "fe", "ae", "xe", "so", "et", "vlan", "lo0", "irb"];

/// Flap count above which carrier transitions are reported.
const FLAP_THRESHOLD: u64 = 50;

/// Lines of `show system processes extensive` holding the header and the top
/// five processes.
const TOP_PROCESSES: std::ops::Range<usize> = 8..14;

fn required<'a>(tree: &'a XmlElement, path: &str) -> Result<&'a XmlElement> {
    tree.find(path)?.ok_or_else(|| {
        DriverError::MissingElement {
            path: path.to_string(),
        }
        .into()
    })
}

fn required_text<'a>(tree: &'a XmlElement, path: &str) -> Result<&'a str> {
    required(tree, path).map(XmlElement::trimmed_text)
}

/// Junos version from the bracketed part of the package comment, e.g.
/// `JUNOS Software Release [23.4R1.10]`.
fn bracketed(comment: &str) -> Option<&str> {
    let (_, rest) = comment.split_once('[')?;
    let (version, _) = rest.split_once(']')?;
    Some(version)
}

/// Serial number lines from `get-chassis-inventory`.
///
/// EX switches (including virtual chassis) list a serial per routing engine;
/// other platforms have one chassis serial.
fn serial_numbers(hardware: &XmlElement) -> Result<String> {
    let modules = hardware.query("//chassis-inventory/chassis/chassis-module")?;
    let is_ex = modules
        .first()
        .and_then(|module| module.child_text("description"))
        .is_some_and(|description| description.to_lowercase().contains("ex"));

    if is_ex {
        let serials: Vec<String> = modules
            .iter()
            .filter_map(|module| {
                let name = module.child_text("name")?;
                name.contains("Routing Engine").then(|| {
                    format!(
                        "{} Serial #: {}",
                        name,
                        module.child_text("serial-number").unwrap_or_default()
                    )
                })
            })
            .collect();
        return Ok(serials.join("\n"));
    }

    let serial = required_text(hardware, "//chassis-inventory/chassis/serial-number")?;
    Ok(format!("Chassis Serial Number: {serial}"))
}

/// Render the device info report from its three replies.
pub(crate) fn render_device_info(
    software: &XmlElement,
    uptime: &XmlElement,
    hardware: &XmlElement,
) -> Result<String> {
    let hostname = required_text(software, "//software-information/host-name")?;
    let model = required_text(software, "//software-information/product-model")?;
    let version = match software.find("//software-information/package-information/comment")? {
        Some(comment) => bracketed(comment.trimmed_text())
            .unwrap_or(comment.trimmed_text())
            .to_string(),
        None => required_text(software, "//software-information/junos-version")?.to_string(),
    };
    let current_time = required_text(uptime, "//current-time/date-time")?;
    let up_time = required_text(uptime, "//uptime-information/up-time")?;
    let serials = serial_numbers(hardware)?;

    Ok(format!(
        "Hostname: {hostname}\nModel: {model}\nJunos Version: {version}\n{serials}\n\
         Current Time: {current_time}\nUptime: {up_time}\n"
    ))
}

fn render_alarms(reply: &XmlElement, none: &str, out: &mut String) -> Result<()> {
    let alarms = reply.query("//alarm-detail")?;
    if alarms.is_empty() {
        out.push_str(none);
        return Ok(());
    }
    for alarm in alarms {
        out.push_str(&format!(
            "{} Alarm \t\t{}\n\t{}\n",
            alarm.child_text("alarm-class").unwrap_or_default(),
            alarm.child_text("alarm-time").unwrap_or_default(),
            alarm.child_text("alarm-description").unwrap_or_default()
        ));
    }
    Ok(())
}

fn command_output(reply: &XmlElement) -> Result<&str> {
    required(reply, "//output").map(|output| output.text.as_str())
}

/// Render the health check report from its four replies.
pub(crate) fn render_health(
    chassis_alarms: &XmlElement,
    system_alarms: &XmlElement,
    routing_engine: &XmlElement,
    processes: &XmlElement,
) -> Result<String> {
    let mut out = String::from("Chassis Alarms:\n\t");
    render_alarms(chassis_alarms, "No chassis alarms active.\n", &mut out)?;

    out.push_str("\nSystem Alarms: \n\t");
    render_alarms(system_alarms, "No system alarms active.\n", &mut out)?;

    out.push('\n');
    out.push_str(command_output(routing_engine)?);

    out.push_str("\n\nTop 5 busiest processes (high mgd values likely from script execution):\n");
    for line in command_output(processes)?
        .split('\n')
        .skip(TOP_PROCESSES.start)
        .take(TOP_PROCESSES.len())
    {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Find error counters on up interfaces in a `show interfaces extensive`
/// reply.
///
/// Physical interfaces are reported before logical ones. Any non-zero error
/// counter is flagged, except carrier transitions which are only flagged
/// above the flap threshold.
pub fn scan_interface_errors(reply: &XmlElement) -> Result<Vec<String>> {
    let mut interfaces = reply.query("//physical-interface")?;
    interfaces.extend(reply.query("//logical-interface")?);

    let mut findings = Vec::new();
    for interface in interfaces {
        let name = interface.child_text("name").unwrap_or_default();
        if !INTERFACE_TYPES.iter().any(|t| name.contains(t)) {
            continue;
        }
        let (Some(admin), Some(oper)) = (
            interface.child_text("admin-status"),
            interface.child_text("oper-status"),
        ) else {
            continue;
        };
        if oper != "up" {
            continue;
        }

        for list in ["input-error-list", "output-error-list"] {
            let Some(counters) = interface.child(list) else {
                continue;
            };
            for counter in &counters.children {
                let Ok(value) = counter.trimmed_text().parse::<u64>() else {
                    continue;
                };
                let message = if counter.name == "carrier-transitions" {
                    if value <= FLAP_THRESHOLD {
                        continue;
                    }
                    format!(" has greater than {FLAP_THRESHOLD} flaps.")
                } else if value > 0 {
                    format!(" has {value} of {}.", counter.name)
                } else {
                    continue;
                };
                findings.push(format!("{name} ({admin}/{oper}){message}"));
            }
        }
    }
    Ok(findings)
}

impl DeviceHandle {
    /// Hostname, model, version, serial numbers, current time and uptime.
    pub async fn device_info(&mut self) -> Result<String> {
        let session = self.rpc_session().await?;
        let software = session.rpc("get-software-information").await?;
        let uptime = session.rpc("get-system-uptime-information").await?;
        let hardware = session.rpc("get-chassis-inventory").await?;
        render_device_info(&software, &uptime, &hardware)
    }

    /// Alarms, routing engine status and the busiest processes.
    pub async fn health_check(&mut self) -> Result<String> {
        let session = self.rpc_session().await?;
        let chassis_alarms = session.command("show chassis alarms", false).await?;
        let system_alarms = session.command("show system alarms", false).await?;
        let routing_engine = session.command("show chassis routing-engine", true).await?;
        let processes = session
            .command("show system processes extensive", true)
            .await?;
        render_health(&chassis_alarms, &system_alarms, &routing_engine, &processes)
    }

    /// Error counters on up interfaces, one line per finding.
    pub async fn interface_errors(&mut self) -> Result<String> {
        let session = self.rpc_session().await?;
        let reply = session.command("show interfaces extensive", false).await?;
        let findings = scan_interface_errors(&reply)?;
        if findings.is_empty() {
            return Ok("No interface errors were detected on this device.\n".to_string());
        }
        Ok(findings.join("\n") + "\n")
    }
}
