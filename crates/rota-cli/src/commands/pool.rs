use rota_core::{Discipline, RosterDb};
use serde::Serialize;

use super::{find_release, print_json, CmdResult};

#[derive(Serialize)]
struct PoolEntry {
    name: String,
    pod: String,
    weight: u32,
}

#[derive(Serialize)]
struct PoolView {
    discipline: &'static str,
    engineers: Vec<PoolEntry>,
}

/// Print the pool grouped by discipline, lightest first. With a release,
/// only engineers holding no role on it are shown.
pub fn run(release: Option<String>) -> CmdResult {
    let db = RosterDb::open()?;
    let mut engineers = match release {
        Some(name) => {
            let release = find_release(&db, &name)?;
            db.remaining_pool(&release)?
        }
        None => db.list_engineers()?,
    };
    engineers.sort_by_key(|e| e.weight);

    let views: Vec<PoolView> = Discipline::ALL
        .iter()
        .map(|discipline| PoolView {
            discipline: discipline.label(),
            engineers: engineers
                .iter()
                .filter(|e| e.discipline == *discipline)
                .map(|e| PoolEntry {
                    name: e.name.clone(),
                    pod: e.pod.clone(),
                    weight: e.weight,
                })
                .collect(),
        })
        .collect();
    print_json(&views)
}
