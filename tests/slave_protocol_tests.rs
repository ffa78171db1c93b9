//! Slave protocol tests
//!
//! A mock master on a loopback listener drives the slave through the
//! handshake and each opcode, asserting on the exact bytes both sides
//! exchange.

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};

use evolink::codec::individual::{read_fitness, read_individual, write_individual};
use evolink::codec::wire::{WireRead, WireWrite};
use evolink::error::EngineResult;
use evolink::eval::{
    GroupedProblem, Slave, SphereProblem, OP_CHECKPOINT, OP_EVALUATE_GROUPED, OP_EVALUATE_SIMPLE,
    OP_SHUTDOWN, RESULT_FITNESS, RESULT_INDIVIDUAL, RESULT_NOTHING,
};
use evolink::fitness::Fitness;
use evolink::genome::Genome;
use evolink::population::Individual;
use evolink::params::Parameters;
use evolink::population::{Species, SpeciesId};
use evolink::rng::MersenneTwister;
use evolink::wire::{CompressingReader, CompressingWriter};

fn slave_params(port: u16) -> Parameters {
    let mut p = Parameters::new();
    p.set("eval.master.host", "127.0.0.1");
    p.set("eval.master.port", &port.to_string());
    p.set("eval.slave-name", "test-slave");
    p.set("pop.subpop.0.species", "float-vector");
    p.set("pop.subpop.0.genome-size", "2");
    p
}

fn species() -> Species {
    Species::from_params(&slave_params(1), 0, SpeciesId(0)).unwrap()
}

fn spawn_slave(params: Parameters) -> JoinHandle<EngineResult<()>> {
    thread::spawn(move || {
        let mut slave = Slave::new(params, Box::new(SphereProblem), None)?;
        slave.run()
    })
}

fn accept_and_handshake(listener: &TcpListener) -> TcpStream {
    let (mut socket, _) = listener.accept().unwrap();
    let name = socket.read_utf().unwrap();
    assert_eq!(name, "test-slave");
    let mut rng = MersenneTwister::new(77);
    rng.write_state(&mut socket).unwrap();
    socket
}

/// S5: handshake then an immediate shutdown; the slave exits cleanly.
#[test]
fn handshake_and_shutdown() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = spawn_slave(slave_params(port));

    let mut socket = accept_and_handshake(&listener);
    socket.write_u8(OP_SHUTDOWN).unwrap();
    socket.flush().unwrap();

    handle.join().unwrap().unwrap();
}

/// S6: evaluate-simple with update flags [true, false] and
/// return-inds=false answers FITNESS then NOTHING, in order.
#[test]
fn evaluate_simple_returns_fitness_then_nothing() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = spawn_slave(slave_params(port));

    let mut socket = accept_and_handshake(&listener);
    let sp = species();

    socket.write_u8(OP_EVALUATE_SIMPLE).unwrap();
    socket.write_i32(2).unwrap();
    socket.write_i32(0).unwrap();
    let mut first = sp.new_individual();
    first.genome = Genome::FloatVector(vec![3.0, 4.0]);
    write_individual(&first, &mut socket).unwrap();
    socket.write_bool(true).unwrap();
    let mut second = sp.new_individual();
    second.genome = Genome::FloatVector(vec![1.0, 1.0]);
    write_individual(&second, &mut socket).unwrap();
    socket.write_bool(false).unwrap();
    socket.flush().unwrap();

    assert_eq!(socket.read_u8().unwrap(), RESULT_FITNESS);
    assert!(socket.read_bool().unwrap(), "individual must come back evaluated");
    let fitness = read_fitness(&sp.fitness_prototype, &mut socket).unwrap();
    assert_eq!(fitness, Fitness::Scalar(-25.0));
    assert_eq!(socket.read_u8().unwrap(), RESULT_NOTHING);

    socket.write_u8(OP_SHUTDOWN).unwrap();
    socket.flush().unwrap();
    handle.join().unwrap().unwrap();
}

/// With return-inds=true the whole evaluated individual comes back.
#[test]
fn evaluate_simple_returns_full_individuals() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut params = slave_params(port);
    params.set("eval.return-inds", "true");
    let handle = spawn_slave(params);

    let mut socket = accept_and_handshake(&listener);
    let sp = species();

    socket.write_u8(OP_EVALUATE_SIMPLE).unwrap();
    socket.write_i32(1).unwrap();
    socket.write_i32(0).unwrap();
    let mut ind = sp.new_individual();
    ind.genome = Genome::FloatVector(vec![2.0, 0.0]);
    write_individual(&ind, &mut socket).unwrap();
    socket.write_bool(false).unwrap();
    socket.flush().unwrap();

    assert_eq!(socket.read_u8().unwrap(), RESULT_INDIVIDUAL);
    let back = read_individual(&sp, &mut socket).unwrap();
    assert!(back.evaluated);
    assert_eq!(back.genome, Genome::FloatVector(vec![2.0, 0.0]));
    assert_eq!(back.fitness, Fitness::Scalar(-4.0));

    socket.write_u8(OP_SHUTDOWN).unwrap();
    socket.flush().unwrap();
    handle.join().unwrap().unwrap();
}

/// The checkpoint opcode returns the slave's random state, which still
/// matches the state the master seeded during the handshake.
#[test]
fn checkpoint_returns_the_seeded_random_state() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = spawn_slave(slave_params(port));

    let (mut socket, _) = listener.accept().unwrap();
    socket.read_utf().unwrap();
    let mut seeded = MersenneTwister::new(4242);
    seeded.write_state(&mut socket).unwrap();

    socket.write_u8(OP_CHECKPOINT).unwrap();
    socket.flush().unwrap();
    let mut returned = MersenneTwister::new(0);
    returned.read_state(&mut socket).unwrap();
    for _ in 0..10_000 {
        assert_eq!(seeded.next_word(), returned.next_word());
    }

    socket.write_u8(OP_SHUTDOWN).unwrap();
    socket.flush().unwrap();
    handle.join().unwrap().unwrap();
}

/// The whole conversation works identically through the framed deflate
/// streams when both sides enable compression.
#[test]
fn compressed_streams_carry_the_same_protocol() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut params = slave_params(port);
    params.set("eval.compression", "true");
    let handle = spawn_slave(params);

    let (socket, _) = listener.accept().unwrap();
    let mut reader = CompressingReader::new(socket.try_clone().unwrap());
    let mut writer = CompressingWriter::new(socket);

    let name = reader.read_utf().unwrap();
    assert_eq!(name, "test-slave");
    let mut rng = MersenneTwister::new(5);
    rng.write_state(&mut writer).unwrap();
    writer.flush().unwrap();

    let sp = species();
    writer.write_u8(OP_EVALUATE_SIMPLE).unwrap();
    writer.write_i32(1).unwrap();
    writer.write_i32(0).unwrap();
    let mut ind = sp.new_individual();
    ind.genome = Genome::FloatVector(vec![1.0, 2.0]);
    write_individual(&ind, &mut writer).unwrap();
    writer.write_bool(true).unwrap();
    writer.flush().unwrap();

    assert_eq!(reader.read_u8().unwrap(), RESULT_FITNESS);
    assert!(reader.read_bool().unwrap());
    let fitness = read_fitness(&sp.fitness_prototype, &mut reader).unwrap();
    assert_eq!(fitness, Fitness::Scalar(-5.0));

    writer.write_u8(OP_SHUTDOWN).unwrap();
    writer.flush().unwrap();
    handle.join().unwrap().unwrap();
}

/// With run-evolve on, the slave evolves the batch locally and returns
/// the final subpopulation instead of plain evaluations.
#[test]
fn run_evolve_returns_the_evolved_subpopulation() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut params = slave_params(port);
    params.set("eval.return-inds", "true");
    params.set("run-evolve", "true");
    params.set("runtime", "2000");
    params.set("generations", "2");
    params.set("es.mu.0", "1");
    params.set("es.lambda.0", "2");
    params.set("seed", "7");
    let handle = spawn_slave(params);

    let mut socket = accept_and_handshake(&listener);
    let sp = species();

    socket.write_u8(OP_EVALUATE_SIMPLE).unwrap();
    socket.write_i32(2).unwrap();
    socket.write_i32(0).unwrap();
    for genes in [[0.5, 0.5], [0.25, 0.25]] {
        let mut ind = sp.new_individual();
        ind.genome = Genome::FloatVector(genes.to_vec());
        write_individual(&ind, &mut socket).unwrap();
        socket.write_bool(true).unwrap();
    }
    socket.flush().unwrap();

    let mut returned = Vec::new();
    for _ in 0..2 {
        assert_eq!(socket.read_u8().unwrap(), RESULT_INDIVIDUAL);
        returned.push(read_individual(&sp, &mut socket).unwrap());
    }
    assert!(returned.iter().all(|i| i.evaluated));
    assert!(returned
        .iter()
        .all(|i| matches!(i.fitness, Fitness::Scalar(_))));

    socket.write_u8(OP_SHUTDOWN).unwrap();
    socket.flush().unwrap();
    handle.join().unwrap().unwrap();
}

/// A grouped request carries per-individual subpopulation numbers and a
/// trailing count-victories flag, and dispatches to the grouped problem
/// form.
#[test]
fn evaluate_grouped_dispatches_to_the_grouped_problem() {
    struct SumGroupedProblem;
    impl GroupedProblem for SumGroupedProblem {
        fn evaluate_group(
            &self,
            inds: &mut [Individual],
            update_fitness: &[bool],
            count_victories_only: bool,
            _thread: usize,
        ) {
            for (ind, update) in inds.iter_mut().zip(update_fitness) {
                if *update {
                    let score = match &ind.genome {
                        Genome::FloatVector(v) => v.iter().sum::<f64>(),
                        _ => 0.0,
                    };
                    let score = if count_victories_only {
                        score.signum()
                    } else {
                        score
                    };
                    ind.set_fitness(Fitness::Scalar(score));
                }
            }
        }
    }

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let params = slave_params(port);
    let handle = thread::spawn(move || {
        let mut slave = Slave::new(
            params,
            Box::new(SphereProblem),
            Some(Box::new(SumGroupedProblem)),
        )?;
        slave.run()
    });

    let mut socket = accept_and_handshake(&listener);
    let sp = species();

    socket.write_u8(OP_EVALUATE_GROUPED).unwrap();
    socket.write_i32(2).unwrap();
    for genes in [[1.0, 2.0], [3.0, 4.0]] {
        socket.write_i32(0).unwrap();
        let mut ind = sp.new_individual();
        ind.genome = Genome::FloatVector(genes.to_vec());
        write_individual(&ind, &mut socket).unwrap();
        socket.write_bool(true).unwrap();
    }
    socket.write_bool(false).unwrap(); // count_victories_only
    socket.flush().unwrap();

    for expected in [3.0, 7.0] {
        assert_eq!(socket.read_u8().unwrap(), RESULT_FITNESS);
        assert!(socket.read_bool().unwrap());
        let fitness = read_fitness(&sp.fitness_prototype, &mut socket).unwrap();
        assert_eq!(fitness, Fitness::Scalar(expected));
    }

    socket.write_u8(OP_SHUTDOWN).unwrap();
    socket.flush().unwrap();
    handle.join().unwrap().unwrap();
}

/// Dropping the connection after the handshake is not fatal: the slave
/// reconnects and a second master can shut it down cleanly.
#[test]
fn slave_reconnects_after_master_disappears() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = spawn_slave(slave_params(port));

    // first master dies right after the handshake
    let socket = accept_and_handshake(&listener);
    drop(socket);

    // second master gets a fresh handshake and shuts the slave down
    let mut socket = accept_and_handshake(&listener);
    socket.write_u8(OP_SHUTDOWN).unwrap();
    socket.flush().unwrap();
    handle.join().unwrap().unwrap();
}
