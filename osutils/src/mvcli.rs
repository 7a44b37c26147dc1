//! Marvell storage controller management through `mvcli`.

use std::collections::HashMap;

use anyhow::{bail, Context, Error};
use log::info;

use stratum_api::constants::VIRTUAL_DISK_BLOCK_SIZE_KIB;

use crate::dependencies::{Command, Dependency};

/// Adapter as reported by `mvcli info -o hba`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    pub id: u32,
    pub product: String,
}

/// Virtual disk as reported by `mvcli info -o vd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDisk {
    pub id: u32,
    pub name: String,
    pub raid_mode: String,
}

/// Physical disk as reported by `mvcli info -o pd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalDisk {
    pub id: u32,
    pub disk_type: String,
    pub serial: String,
}

/// mvcli prints one `key: value` block per object, blocks separated by blank
/// lines. Keys are lowercased.
fn parse_blocks(output: &str) -> Vec<HashMap<String, String>> {
    let mut blocks = Vec::new();
    let mut current = HashMap::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            current.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn parse_id(block: &HashMap<String, String>, key: &str) -> Result<Option<u32>, Error> {
    block
        .get(key)
        .map(|id| {
            id.parse()
                .with_context(|| format!("Invalid value '{id}' for '{key}'"))
        })
        .transpose()
}

fn field(block: &HashMap<String, String>, key: &str) -> String {
    block.get(key).cloned().unwrap_or_default()
}

fn info(object: &str) -> Result<String, Error> {
    let output = Dependency::Mvcli
        .cmd()
        .args(["info", "-o", object])
        .output_and_check()
        .with_context(|| format!("Failed to query mvcli '{object}' info"))?;

    if output.contains("No adapter") {
        bail!("mvcli found no adapter");
    }
    Ok(output)
}

pub fn adapters() -> Result<Vec<Adapter>, Error> {
    parse_adapters(&info("hba")?)
}

fn parse_adapters(output: &str) -> Result<Vec<Adapter>, Error> {
    let mut adapters = Vec::new();
    for block in parse_blocks(output) {
        let Some(id) = parse_id(&block, "adapter id")? else {
            continue;
        };
        adapters.push(Adapter {
            id,
            product: field(&block, "product"),
        });
    }
    Ok(adapters)
}

pub fn virtual_disks() -> Result<Vec<VirtualDisk>, Error> {
    parse_virtual_disks(&info("vd")?)
}

fn parse_virtual_disks(output: &str) -> Result<Vec<VirtualDisk>, Error> {
    let mut disks = Vec::new();
    for block in parse_blocks(output) {
        let Some(id) = parse_id(&block, "id")? else {
            continue;
        };
        disks.push(VirtualDisk {
            id,
            name: field(&block, "name"),
            raid_mode: field(&block, "raid mode").to_lowercase(),
        });
    }
    Ok(disks)
}

pub fn physical_disks() -> Result<Vec<PhysicalDisk>, Error> {
    parse_physical_disks(&info("pd")?)
}

fn parse_physical_disks(output: &str) -> Result<Vec<PhysicalDisk>, Error> {
    let mut disks = Vec::new();
    for block in parse_blocks(output) {
        let Some(id) = parse_id(&block, "pd id")? else {
            continue;
        };
        disks.push(PhysicalDisk {
            id,
            disk_type: field(&block, "type"),
            serial: field(&block, "serial"),
        });
    }
    Ok(disks)
}

pub fn create_virtual_disk_command(level: &str, name: &str, disk_ids: &[u32]) -> Command {
    let ids = disk_ids
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let mut cmd = Dependency::Mvcli.cmd();
    cmd.args(["create", "-o", "vd", "-r", level, "-d"])
        .arg(ids)
        .args(["-n", name, "-b"])
        .arg(VIRTUAL_DISK_BLOCK_SIZE_KIB.to_string());
    cmd
}

pub fn create_virtual_disk(level: &str, name: &str, disk_ids: &[u32]) -> Result<String, Error> {
    info!("Creating virtual disk '{name}' ({level}) on disks {disk_ids:?}");
    create_virtual_disk_command(level, name, disk_ids)
        .output_and_check()
        .with_context(|| format!("Failed to create virtual disk '{name}'"))
}

pub fn delete_virtual_disk_command(id: u32) -> Command {
    let mut cmd = Dependency::Mvcli.cmd();
    cmd.args(["delete", "-o", "vd", "-i"])
        .arg(id.to_string())
        .args(["-f", "--waiveconfirmation"]);
    cmd
}

pub fn delete_virtual_disk(id: u32) -> Result<String, Error> {
    info!("Deleting virtual disk {id}");
    delete_virtual_disk_command(id)
        .output_and_check()
        .with_context(|| format!("Failed to delete virtual disk {id}"))
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn test_parse_adapters() {
        let output = indoc! {"
            Adapter ID:                     0
            Product:                        1b4b-9230
            Sub Product:                    1d49-0300
            Chip revision:                  A1
            slot number:                    0
            Max PCIe speed:                 5Gb/s

            Total # of HBA:                 1
        "};
        assert_eq!(
            parse_adapters(output).unwrap(),
            [Adapter {
                id: 0,
                product: "1b4b-9230".into()
            }]
        );
    }

    #[test]
    fn test_parse_virtual_disks() {
        let output = indoc! {"
            id:                  0
            name:                OS
            status:              functional
            Stripe size:         64
            RAID mode:           RAID1
            size:                227935 MB
            # of PDs:            2
            PD RAID setup:       0 1

            id:                  1
            name:                DATA
            RAID mode:           RAID0

            Total # of VD:       2
        "};
        assert_eq!(
            parse_virtual_disks(output).unwrap(),
            [
                VirtualDisk {
                    id: 0,
                    name: "OS".into(),
                    raid_mode: "raid1".into()
                },
                VirtualDisk {
                    id: 1,
                    name: "DATA".into(),
                    raid_mode: "raid0".into()
                },
            ]
        );

        assert!(parse_virtual_disks("").unwrap().is_empty());
        assert!(parse_virtual_disks("id: zero\n").is_err());
    }

    #[test]
    fn test_parse_physical_disks() {
        let output = indoc! {"
            Adapter:                  0
            PD ID:                    0
            Type:                     SATA PD
            Status:                   Configured
            Size:                     228936 MB
            model:                    MTFDDAV240TDU
            Serial:                   2029290A4FCE

            Adapter:                  0
            PD ID:                    1
            Type:                     SATA PD
            Serial:                   2029290A5A1B

            Total # of PD:            2
        "};
        let disks = parse_physical_disks(output).unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(
            disks[0],
            PhysicalDisk {
                id: 0,
                disk_type: "SATA PD".into(),
                serial: "2029290A4FCE".into()
            }
        );
        assert_eq!(disks[1].id, 1);
    }

    #[test]
    fn test_commands() {
        let create = create_virtual_disk_command("raid1", "DATA", &[0, 1]).render_command();
        assert!(create.ends_with("create -o vd -r raid1 -d 0,1 -n DATA -b 64"));

        let delete = delete_virtual_disk_command(3).render_command();
        assert!(delete.ends_with("delete -o vd -i 3 -f --waiveconfirmation"));
    }
}
