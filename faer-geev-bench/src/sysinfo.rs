//! system snapshot recorded next to each measurement.
//!
//! every field the platform cannot supply is left as `None`. on linux the values come from
//! `/proc` and `/sys`, gpu information comes from `nvidia-smi` when it is installed.

use human_repr::HumanCount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use std::time::Duration;

const USAGE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
	pub os: OsInfo,
	pub cpu: CpuInfo,
	pub memory: MemoryInfo,
	pub gpus: Vec<GpuInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OsInfo {
	pub system: Option<String>,
	pub node: Option<String>,
	pub release: Option<String>,
	pub version: Option<String>,
	pub machine: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
	pub model: Option<String>,
	pub physical_cores: Option<usize>,
	pub logical_cores: Option<usize>,
	/// MHz
	pub freq_current: Option<f64>,
	pub freq_min: Option<f64>,
	pub freq_max: Option<f64>,
	/// percent, one entry per logical core
	pub usage_per_core: Vec<f64>,
	pub usage_total: Option<f64>,
}

/// bytes
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
	pub total: Option<u64>,
	pub available: Option<u64>,
	pub used: Option<u64>,
	pub percent: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
	pub id: usize,
	pub name: String,
	/// utilization, in `[0, 1]`
	pub load: Option<f64>,
	/// MiB
	pub memory_free: Option<f64>,
	pub memory_used: Option<f64>,
	pub memory_total: Option<f64>,
	/// degrees Celsius
	pub temperature: Option<f64>,
	pub uuid: String,
}

/// cumulative jiffies of one `cpu` line of `/proc/stat`
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct CpuTimes {
	idle: u64,
	total: u64,
}

fn read(path: &str) -> Option<String> {
	std::fs::read_to_string(path).ok()
}

fn read_trimmed(path: &str) -> Option<String> {
	read(path).map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

impl SystemInfo {
	/// takes a snapshot. blocks for about 100ms to sample cpu usage.
	pub fn snapshot() -> Self {
		Self {
			os: OsInfo::snapshot(),
			cpu: CpuInfo::snapshot(),
			memory: read("/proc/meminfo").map(|s| parse_meminfo(&s)).unwrap_or_default(),
			gpus: query_gpus(),
		}
	}
}

impl OsInfo {
	fn snapshot() -> Self {
		Self {
			system: read_trimmed("/proc/sys/kernel/ostype").or_else(|| Some(std::env::consts::OS.to_owned())),
			node: read_trimmed("/proc/sys/kernel/hostname"),
			release: read_trimmed("/proc/sys/kernel/osrelease"),
			version: read_trimmed("/proc/sys/kernel/version"),
			machine: Some(std::env::consts::ARCH.to_owned()),
		}
	}
}

impl CpuInfo {
	fn snapshot() -> Self {
		let cpuinfo = read("/proc/cpuinfo").unwrap_or_default();
		let khz_to_mhz = |path: &str| read_trimmed(path)?.parse::<f64>().ok().map(|khz| khz / 1000.0);

		let before = read("/proc/stat").map(|s| parse_stat(&s));
		std::thread::sleep(USAGE_INTERVAL);
		let after = read("/proc/stat").map(|s| parse_stat(&s));

		let (usage_total, usage_per_core) = match (before, after) {
			(Some(before), Some(after)) if !before.is_empty() && before.len() == after.len() => {
				let usage: Vec<f64> = before.iter().zip(&after).map(|(b, a)| usage(*b, *a)).collect();
				(Some(usage[0]), usage[1..].to_vec())
			}
			_ => (None, Vec::new()),
		};

		Self {
			model: cpu_model(&cpuinfo),
			physical_cores: Some(num_cpus::get_physical()),
			logical_cores: Some(num_cpus::get()),
			freq_current: cpu_mhz(&cpuinfo),
			freq_min: khz_to_mhz("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_min_freq"),
			freq_max: khz_to_mhz("/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq"),
			usage_per_core,
			usage_total,
		}
	}
}

fn cpuinfo_values<'a>(cpuinfo: &'a str, key: &'a str) -> impl Iterator<Item = &'a str> {
	cpuinfo.lines().filter_map(move |line| {
		let (k, v) = line.split_once(':')?;
		(k.trim() == key).then(|| v.trim())
	})
}

fn cpu_model(cpuinfo: &str) -> Option<String> {
	cpuinfo_values(cpuinfo, "model name").next().map(str::to_owned)
}

/// mean of the per-core current frequencies
fn cpu_mhz(cpuinfo: &str) -> Option<f64> {
	let freqs: Vec<f64> = cpuinfo_values(cpuinfo, "cpu MHz").filter_map(|v| v.parse().ok()).collect();
	if freqs.is_empty() {
		None
	} else {
		Some(freqs.iter().sum::<f64>() / freqs.len() as f64)
	}
}

/// aggregate line first, then one entry per core
fn parse_stat(stat: &str) -> Vec<CpuTimes> {
	stat.lines()
		.filter(|line| line.starts_with("cpu"))
		.filter_map(|line| {
			let fields: Vec<u64> = line.split_whitespace().skip(1).map(|f| f.parse().ok()).collect::<Option<_>>()?;
			if fields.len() < 4 {
				return None;
			}
			// idle + iowait
			let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
			Some(CpuTimes {
				idle,
				total: fields.iter().sum(),
			})
		})
		.collect()
}

/// busy percentage between two samples
fn usage(before: CpuTimes, after: CpuTimes) -> f64 {
	let total = after.total.saturating_sub(before.total);
	if total == 0 {
		return 0.0;
	}
	let idle = after.idle.saturating_sub(before.idle);
	100.0 * (total.saturating_sub(idle)) as f64 / total as f64
}

fn parse_meminfo(meminfo: &str) -> MemoryInfo {
	let field = |key: &str| {
		meminfo.lines().find_map(|line| {
			let rest = line.strip_prefix(key)?.strip_prefix(':')?;
			let kib: u64 = rest.split_whitespace().next()?.parse().ok()?;
			Some(kib * 1024)
		})
	};

	let total = field("MemTotal");
	let available = field("MemAvailable");
	let used = total.zip(available).map(|(t, a)| t.saturating_sub(a));
	let percent = total
		.zip(used)
		.filter(|&(t, _)| t > 0)
		.map(|(t, u)| 100.0 * u as f64 / t as f64);

	MemoryInfo {
		total,
		available,
		used,
		percent,
	}
}

fn query_gpus() -> Vec<GpuInfo> {
	let output = Command::new("nvidia-smi")
		.args([
			"--query-gpu=index,name,utilization.gpu,memory.free,memory.used,memory.total,temperature.gpu,uuid",
			"--format=csv,noheader,nounits",
		])
		.output();

	match output {
		Ok(output) if output.status.success() => parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout)),
		_ => Vec::new(),
	}
}

fn parse_nvidia_smi(text: &str) -> Vec<GpuInfo> {
	// values such as "[N/A]" become `None`
	let num = |s: &str| s.parse::<f64>().ok();

	text.lines()
		.filter_map(|line| {
			let fields: Vec<&str> = line.split(',').map(str::trim).collect();
			if fields.len() != 8 {
				return None;
			}
			Some(GpuInfo {
				id: fields[0].parse().ok()?,
				name: fields[1].to_owned(),
				load: num(fields[2]).map(|p| p / 100.0),
				memory_free: num(fields[3]),
				memory_used: num(fields[4]),
				memory_total: num(fields[5]),
				temperature: num(fields[6]),
				uuid: fields[7].to_owned(),
			})
		})
		.collect()
}

struct Opt<'a, T>(&'a Option<T>);

impl<T: fmt::Display> fmt::Display for Opt<'_, T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.0 {
			Some(value) => value.fmt(f),
			None => f.write_str("n/a"),
		}
	}
}

fn bytes(value: Option<u64>) -> String {
	value.map_or_else(|| "n/a".to_owned(), |b| b.human_count_bytes().to_string())
}

fn mib(value: Option<f64>) -> String {
	value.map_or_else(|| "n/a".to_owned(), |m| ((m * 1024.0 * 1024.0) as u64).human_count_bytes().to_string())
}

impl fmt::Display for SystemInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let os = &self.os;
		writeln!(f, "system     {}", Opt(&os.system))?;
		writeln!(f, "node       {}", Opt(&os.node))?;
		writeln!(f, "release    {}", Opt(&os.release))?;
		writeln!(f, "version    {}", Opt(&os.version))?;
		writeln!(f, "machine    {}", Opt(&os.machine))?;

		let cpu = &self.cpu;
		writeln!(f, "cpu        {}", Opt(&cpu.model))?;
		writeln!(f, "cores      {} physical, {} logical", Opt(&cpu.physical_cores), Opt(&cpu.logical_cores))?;
		writeln!(
			f,
			"frequency  {} MHz (min {} MHz, max {} MHz)",
			Opt(&cpu.freq_current.map(|x| format!("{x:.0}"))),
			Opt(&cpu.freq_min.map(|x| format!("{x:.0}"))),
			Opt(&cpu.freq_max.map(|x| format!("{x:.0}"))),
		)?;
		writeln!(f, "cpu usage  {}%", Opt(&cpu.usage_total.map(|x| format!("{x:.1}"))))?;
		for (i, usage) in cpu.usage_per_core.iter().enumerate() {
			writeln!(f, "  core {i:<4} {usage:.1}%")?;
		}

		let mem = &self.memory;
		writeln!(
			f,
			"memory     {} total, {} available, {} used ({}%)",
			bytes(mem.total),
			bytes(mem.available),
			bytes(mem.used),
			Opt(&mem.percent.map(|x| format!("{x:.1}"))),
		)?;

		if self.gpus.is_empty() {
			writeln!(f, "gpus       none")?;
		}
		for gpu in &self.gpus {
			writeln!(f, "gpu {}      {} ({})", gpu.id, gpu.name, gpu.uuid)?;
			writeln!(
				f,
				"  load {}%, memory {} free, {} used, {} total, {} C",
				Opt(&gpu.load.map(|x| format!("{:.0}", 100.0 * x))),
				mib(gpu.memory_free),
				mib(gpu.memory_used),
				mib(gpu.memory_total),
				Opt(&gpu.temperature),
			)?;
		}
		Ok(())
	}
}
