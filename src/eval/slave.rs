//! Slave evaluation process
//!
//! A slave connects to its master, announces itself, adopts the master's
//! random-generator state, and then serves evaluation requests until
//! told to shut down. Requests carry batches of individuals; responses
//! carry either full individuals or just fitnesses, flushed once per
//! batch.
//!
//! The failure model is asymmetric. Failing to read a request after a
//! successful handshake usually means the master closed its socket and
//! exited, so the slave logs a warning and goes back to waiting for a
//! new master. Failing during the handshake, or failing to write, is
//! fatal.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::breed::EsBreeder;
use crate::codec::individual::{read_individual, write_fitness, write_individual};
use crate::codec::wire::{WireRead, WireWrite};
use crate::error::{CodecError, EngineError, EngineResult, ProtocolError, SetupError};
use crate::params::Parameters;
use crate::population::Individual;
use crate::state::{state_registry, EvolutionState, EvolveOutcome};
use crate::wire::{CompressingReader, CompressingWriter};

use super::problem::{GroupedProblem, SimpleProblem};

/// Master-to-slave opcodes
pub const OP_SHUTDOWN: u8 = 0;
/// Evaluate a batch of individuals from one subpopulation
pub const OP_EVALUATE_SIMPLE: u8 = 1;
/// Evaluate a group of individuals together
pub const OP_EVALUATE_GROUPED: u8 = 2;
/// Write the slave's random state back for a master checkpoint
pub const OP_CHECKPOINT: u8 = 3;

/// Per-individual result codes
pub const RESULT_NOTHING: u8 = 0;
/// The full individual follows
pub const RESULT_INDIVIDUAL: u8 = 1;
/// The evaluated flag and fitness follow
pub const RESULT_FITNESS: u8 = 2;

/// How long the slave sleeps between connection attempts
const SLEEP_TIME: Duration = Duration::from_millis(100);

/// Slave configuration from the parameter database
#[derive(Clone, Debug)]
pub struct SlaveConfig {
    /// Identifier sent on handshake; generated from the local address
    /// and wall clock when absent
    pub name: Option<String>,
    /// Master endpoint host
    pub master_host: String,
    /// Master endpoint port
    pub master_port: u16,
    /// Wrap the connection in framed deflate streams
    pub compression: bool,
    /// Return full individuals instead of fitnesses
    pub return_individuals: bool,
    /// Re-evolve received individuals locally before returning them
    pub run_evolve: bool,
    /// Wall-clock bound on one re-evolution, in milliseconds
    pub run_time_ms: u64,
}

impl SlaveConfig {
    /// Read the `eval.*`, `runtime`, and `run-evolve` parameters
    pub fn from_params(params: &Parameters) -> Result<Self, SetupError> {
        let master_host = params.require_string("eval.master.host")?.to_string();
        let port = params.require_int("eval.master.port")?;
        if !(1..=u16::MAX as i64).contains(&port) {
            return Err(SetupError::BadParameter {
                path: "eval.master.port".to_string(),
                message: format!("expected a port number, found {port}"),
            });
        }
        Ok(Self {
            name: params.get_string("eval.slave-name").map(str::to_string),
            master_host,
            master_port: port as u16,
            compression: params.get_bool("eval.compression", false)?,
            return_individuals: params.get_bool("eval.return-inds", false)?,
            run_evolve: params.get_bool("run-evolve", false)?,
            run_time_ms: params.get_int("runtime", 0)?.max(0) as u64,
        })
    }
}

enum Served {
    Shutdown,
    Reconnect,
}

struct SimpleRequest {
    subpop: usize,
    inds: Vec<Individual>,
    updates: Vec<bool>,
}

struct GroupedRequest {
    inds: Vec<Individual>,
    updates: Vec<bool>,
    count_victories_only: bool,
}

/// The slave runtime
pub struct Slave {
    config: SlaveConfig,
    state: EvolutionState,
    problem: Box<dyn SimpleProblem>,
    grouped: Option<Box<dyn GroupedProblem>>,
}

impl Slave {
    /// Build a slave from a parameter database and its problem forms
    ///
    /// The `state` parameter selects the evolution-state variant through
    /// the registry; `eval.*` parameters configure the connection.
    pub fn new(
        params: Parameters,
        problem: Box<dyn SimpleProblem>,
        grouped: Option<Box<dyn GroupedProblem>>,
    ) -> EngineResult<Self> {
        let config = SlaveConfig::from_params(&params)?;
        let tag = params.get_string("state").unwrap_or("simple").to_string();
        let state = state_registry().create(&tag, params)?;
        Ok(Self {
            config,
            state,
            problem,
            grouped,
        })
    }

    /// Serve masters until one sends a shutdown
    ///
    /// Returns `Ok(())` on a clean shutdown; connection losses after the
    /// handshake re-enter the connect loop.
    pub fn run(&mut self) -> EngineResult<()> {
        loop {
            let socket = self.connect()?;
            match self.serve(socket)? {
                Served::Shutdown => return Ok(()),
                Served::Reconnect => continue,
            }
        }
    }

    fn connect(&self) -> EngineResult<TcpStream> {
        let host = self.config.master_host.as_str();
        let port = self.config.master_port;
        info!(host, port, "connecting to master");
        let mut attempts: u64 = 0;
        loop {
            match TcpStream::connect((host, port)) {
                Ok(socket) => {
                    info!(
                        waited_ms = attempts * SLEEP_TIME.as_millis() as u64,
                        "connected to master"
                    );
                    return Ok(socket);
                }
                // the master is not up yet
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    attempts += 1;
                    thread::sleep(SLEEP_TIME);
                }
                Err(source) => {
                    return Err(ProtocolError::Handshake {
                        host: host.to_string(),
                        port,
                        source,
                    }
                    .into())
                }
            }
        }
    }

    fn slave_name(&self, socket: &TcpStream) -> String {
        if let Some(name) = &self.config.name {
            return name.clone();
        }
        let local = socket
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let name = format!("{local}/{millis}");
        info!(name, "no slave name specified, generated one");
        name
    }

    fn serve(&mut self, socket: TcpStream) -> EngineResult<Served> {
        let read_half = socket.try_clone().map_err(ProtocolError::Io)?;
        let write_half = socket.try_clone().map_err(ProtocolError::Io)?;
        let mut reader: Box<dyn Read> = if self.config.compression {
            Box::new(CompressingReader::new(read_half))
        } else {
            Box::new(BufReader::new(read_half))
        };
        let mut writer: Box<dyn Write> = if self.config.compression {
            Box::new(CompressingWriter::new(write_half))
        } else {
            Box::new(BufWriter::new(write_half))
        };

        // Handshake: any failure here is fatal.
        let name = self.slave_name(&socket);
        writer.write_utf(&name).map_err(ProtocolError::Io)?;
        writer.flush().map_err(ProtocolError::Io)?;
        self.state.random[0]
            .read_state(&mut reader)
            .map_err(ProtocolError::Io)?;
        debug!("read master random state");

        loop {
            let opcode = match reader.read_u8() {
                Ok(opcode) => opcode,
                Err(e) => {
                    warn!(
                        error = %e,
                        "unable to read a request from the master, maybe it closed its socket and exited; reconnecting"
                    );
                    return Ok(Served::Reconnect);
                }
            };
            match opcode {
                OP_SHUTDOWN => {
                    info!("master requested shutdown");
                    return Ok(Served::Shutdown);
                }
                OP_EVALUATE_SIMPLE => {
                    let request = match self.read_simple_request(&mut reader) {
                        Ok(request) => request,
                        Err(CodecError::Io(e)) => {
                            warn!(error = %e, "lost the master mid-request, reconnecting");
                            return Ok(Served::Reconnect);
                        }
                        Err(other) => return Err(other.into()),
                    };
                    let (inds, updates) = self.evaluate_simple(request)?;
                    self.return_individuals(&mut writer, &inds, &updates)?;
                }
                OP_EVALUATE_GROUPED => {
                    let request = match self.read_grouped_request(&mut reader) {
                        Ok(request) => request,
                        Err(CodecError::Io(e)) => {
                            warn!(error = %e, "lost the master mid-request, reconnecting");
                            return Ok(Served::Reconnect);
                        }
                        Err(other) => return Err(other.into()),
                    };
                    let (inds, updates) = self.evaluate_grouped(request)?;
                    self.return_individuals(&mut writer, &inds, &updates)?;
                }
                OP_CHECKPOINT => {
                    info!("checkpointing random state for the master");
                    self.state.random[0]
                        .write_state(&mut writer)
                        .map_err(ProtocolError::Io)?;
                    writer.flush().map_err(ProtocolError::Io)?;
                }
                other => return Err(ProtocolError::UnknownOpcode(other).into()),
            }
        }
    }

    fn read_simple_request(
        &mut self,
        reader: &mut dyn Read,
    ) -> Result<SimpleRequest, CodecError> {
        let n = reader.read_i32()?;
        let subpop = reader.read_i32()?;
        if n < 0 || subpop < 0 {
            return Err(CodecError::Malformed(format!(
                "bad evaluation header: {n} individuals, subpopulation {subpop}"
            )));
        }
        let subpop = subpop as usize;
        self.state
            .ensure_subpop(subpop)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        let species = self.state.species(self.state.population.subpops[subpop].species);

        let mut inds = Vec::with_capacity(n as usize);
        let mut updates = Vec::with_capacity(n as usize);
        for _ in 0..n {
            inds.push(read_individual(species, reader)?);
            updates.push(reader.read_bool()?);
        }
        Ok(SimpleRequest {
            subpop,
            inds,
            updates,
        })
    }

    fn evaluate_simple(
        &mut self,
        request: SimpleRequest,
    ) -> EngineResult<(Vec<Individual>, Vec<bool>)> {
        let SimpleRequest {
            subpop,
            mut inds,
            updates,
        } = request;
        if self.config.run_evolve {
            inds = self.re_evolve(inds)?;
        } else {
            for ind in &mut inds {
                self.problem.evaluate(ind, subpop, 0);
            }
        }
        Ok((inds, updates))
    }

    fn read_grouped_request(
        &mut self,
        reader: &mut dyn Read,
    ) -> Result<GroupedRequest, CodecError> {
        let n = reader.read_i32()?;
        if n < 0 {
            return Err(CodecError::Malformed(format!("bad group size {n}")));
        }
        let mut inds = Vec::with_capacity(n as usize);
        let mut updates = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let subpop = reader.read_i32()?;
            if subpop < 0 {
                return Err(CodecError::Malformed(format!(
                    "bad subpopulation number {subpop}"
                )));
            }
            let subpop = subpop as usize;
            self.state
                .ensure_subpop(subpop)
                .map_err(|e| CodecError::Malformed(e.to_string()))?;
            let species = self.state.species(self.state.population.subpops[subpop].species);
            inds.push(read_individual(species, reader)?);
            updates.push(reader.read_bool()?);
        }
        let count_victories_only = reader.read_bool()?;
        Ok(GroupedRequest {
            inds,
            updates,
            count_victories_only,
        })
    }

    fn evaluate_grouped(
        &mut self,
        request: GroupedRequest,
    ) -> EngineResult<(Vec<Individual>, Vec<bool>)> {
        let GroupedRequest {
            mut inds,
            updates,
            count_victories_only,
        } = request;
        let grouped = self.grouped.as_ref().ok_or_else(|| {
            EngineError::Setup(SetupError::BadParameter {
                path: "eval.problem".to_string(),
                message: "master requested grouped evaluation but no grouped problem form is configured"
                    .to_string(),
            })
        })?;
        grouped.evaluate_group(&mut inds, &updates, count_victories_only, 0);
        Ok((inds, updates))
    }

    /// Re-evolve a batch locally for the configured wall-clock budget
    ///
    /// Spins up a temporary evolution state from a fresh parameter load,
    /// injects the batch as its subpopulation 0, and evolves until the
    /// state signals completion or the budget runs out. Returns the
    /// final subpopulation.
    fn re_evolve(&mut self, inds: Vec<Individual>) -> EngineResult<Vec<Individual>> {
        let params = self.state.params.clone();
        let tag = params.get_string("state").unwrap_or("simple").to_string();
        let mut temp = state_registry().create(&tag, params)?;
        temp.ensure_subpop(0)?;
        temp.population.subpops.truncate(1);
        temp.population.subpops[0].individuals = inds;

        let mut breeder = EsBreeder::from_params(&temp.params, 1)?;
        let budget = Duration::from_millis(self.config.run_time_ms);
        let start = Instant::now();
        let mut outcome = EvolveOutcome::NotDone;
        while outcome == EvolveOutcome::NotDone {
            outcome = temp.evolve(&mut breeder, self.problem.as_ref())?;
            if start.elapsed() > budget {
                break;
            }
        }
        Ok(std::mem::take(&mut temp.population.subpops[0].individuals))
    }

    /// Write the per-individual results and flush once for the batch
    fn return_individuals(
        &self,
        writer: &mut dyn Write,
        inds: &[Individual],
        updates: &[bool],
    ) -> EngineResult<()> {
        for (ind, update) in inds.iter().zip(updates.iter()) {
            let code = if self.config.return_individuals {
                RESULT_INDIVIDUAL
            } else if *update {
                RESULT_FITNESS
            } else {
                RESULT_NOTHING
            };
            writer.write_u8(code).map_err(ProtocolError::Io)?;
            if code == RESULT_INDIVIDUAL {
                write_individual(ind, writer).map_err(EngineError::Codec)?;
            } else if code == RESULT_FITNESS {
                writer.write_bool(ind.evaluated).map_err(ProtocolError::Io)?;
                write_fitness(&ind.fitness, writer).map_err(EngineError::Codec)?;
            }
        }
        writer.flush().map_err(ProtocolError::Io)?;
        Ok(())
    }
}
