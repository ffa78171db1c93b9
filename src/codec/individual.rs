//! Individual and fitness encodings
//!
//! Two encodings of the same data. The binary form is the wire and
//! checkpoint format: a leading variant tag, then big-endian fields in a
//! fixed order (evaluated flag, fitness, genotype). The text form is for
//! human-inspectable population files and is built from the
//! self-delimiting tokens in [`super::text`].
//!
//! Reads are driven by the species prototype, and the variant tags make
//! a stream written for one genome or fitness kind fail loudly when read
//! as another. Both encodings satisfy `read(write(x)) == x`.

use std::io::{Read, Write};

use crate::error::CodecError;
use crate::fitness::{Fitness, MultiObjectiveFitness, Spea2Fitness};
use crate::genome::{Genome, TreeNode};
use crate::population::{Individual, Species};

use super::text::{self, TextDecoder};
use super::wire::{WireRead, WireWrite};

const GENOME_INT: u8 = 0;
const GENOME_LONG: u8 = 1;
const GENOME_FLOAT: u8 = 2;
const GENOME_BIT: u8 = 3;
const GENOME_TREE: u8 = 4;

const FITNESS_SCALAR: u8 = 0;
const FITNESS_MULTI: u8 = 1;
const FITNESS_SPEA2: u8 = 2;

fn genome_tag(genome: &Genome) -> u8 {
    match genome {
        Genome::IntVector(_) => GENOME_INT,
        Genome::LongVector(_) => GENOME_LONG,
        Genome::FloatVector(_) => GENOME_FLOAT,
        Genome::BitVector(_) => GENOME_BIT,
        Genome::Tree(_) => GENOME_TREE,
    }
}

fn fitness_tag(fitness: &Fitness) -> u8 {
    match fitness {
        Fitness::Scalar(_) => FITNESS_SCALAR,
        Fitness::Multi(_) => FITNESS_MULTI,
        Fitness::Spea2(_) => FITNESS_SPEA2,
    }
}

/// Write a genome: variant tag, `i32` length, then the genome words
pub fn write_genome<W: Write + ?Sized>(genome: &Genome, out: &mut W) -> Result<(), CodecError> {
    out.write_u8(genome_tag(genome))?;
    match genome {
        Genome::IntVector(v) => {
            out.write_i32(v.len() as i32)?;
            for g in v {
                out.write_i32(*g)?;
            }
        }
        Genome::LongVector(v) => {
            out.write_i32(v.len() as i32)?;
            for g in v {
                out.write_i64(*g)?;
            }
        }
        Genome::FloatVector(v) => {
            out.write_i32(v.len() as i32)?;
            for g in v {
                out.write_f64(*g)?;
            }
        }
        Genome::BitVector(v) => {
            out.write_i32(v.len() as i32)?;
            for g in v {
                out.write_bool(*g)?;
            }
        }
        Genome::Tree(t) => {
            out.write_i32(t.size() as i32)?;
            write_tree(t, out)?;
        }
    }
    Ok(())
}

fn write_tree<W: Write + ?Sized>(node: &TreeNode, out: &mut W) -> Result<(), CodecError> {
    out.write_i32(node.symbol)?;
    out.write_i32(node.children.len() as i32)?;
    for child in &node.children {
        write_tree(child, out)?;
    }
    Ok(())
}

fn read_length<R: Read + ?Sized>(input: &mut R) -> Result<usize, CodecError> {
    let len = input.read_i32()?;
    if len < 0 {
        return Err(CodecError::Malformed(format!("negative genome length {len}")));
    }
    Ok(len as usize)
}

/// Read a genome of the prototype's variant
pub fn read_genome<R: Read + ?Sized>(prototype: &Genome, input: &mut R) -> Result<Genome, CodecError> {
    let tag = input.read_u8()?;
    let expected = genome_tag(prototype);
    if tag != expected {
        return Err(CodecError::Malformed(format!(
            "genome variant mismatch: stream has tag {tag}, species expects {} (tag {expected})",
            prototype.kind()
        )));
    }
    let genome = match tag {
        GENOME_INT => {
            let len = read_length(input)?;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(input.read_i32()?);
            }
            Genome::IntVector(v)
        }
        GENOME_LONG => {
            let len = read_length(input)?;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(input.read_i64()?);
            }
            Genome::LongVector(v)
        }
        GENOME_FLOAT => {
            let len = read_length(input)?;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(input.read_f64()?);
            }
            Genome::FloatVector(v)
        }
        GENOME_BIT => {
            let len = read_length(input)?;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(input.read_bool()?);
            }
            Genome::BitVector(v)
        }
        GENOME_TREE => {
            let size = read_length(input)?;
            let tree = read_tree(input, size)?;
            Genome::Tree(tree)
        }
        _ => unreachable!("tag already validated against the prototype"),
    };
    Ok(genome)
}

fn read_tree<R: Read + ?Sized>(input: &mut R, size_budget: usize) -> Result<TreeNode, CodecError> {
    if size_budget == 0 {
        return Err(CodecError::Malformed(
            "tree stream larger than its declared size".to_string(),
        ));
    }
    let symbol = input.read_i32()?;
    let arity = input.read_i32()?;
    if arity < 0 || arity as usize >= size_budget {
        return Err(CodecError::Malformed(format!("bad tree arity {arity}")));
    }
    let mut children = Vec::with_capacity(arity as usize);
    let mut remaining = size_budget - 1;
    for _ in 0..arity {
        let child = read_tree(input, remaining)?;
        remaining -= child.size();
        children.push(child);
    }
    Ok(TreeNode { symbol, children })
}

/// Write a fitness: variant tag, then the variant payload
///
/// The multi-objective payload is `i32` objective count, the objectives
/// as `f32`, then the maximize flag; the SPEA2 form appends its ranking
/// values as `f64`.
pub fn write_fitness<W: Write + ?Sized>(fitness: &Fitness, out: &mut W) -> Result<(), CodecError> {
    out.write_u8(fitness_tag(fitness))?;
    match fitness {
        Fitness::Scalar(v) => out.write_f64(*v)?,
        Fitness::Multi(f) => write_multi(f, out)?,
        Fitness::Spea2(f) => {
            write_multi(&f.base, out)?;
            out.write_f64(f.spea2_fitness)?;
            out.write_f64(f.strength)?;
            out.write_f64(f.kth_nn_distance)?;
        }
    }
    Ok(())
}

fn write_multi<W: Write + ?Sized>(f: &MultiObjectiveFitness, out: &mut W) -> Result<(), CodecError> {
    out.write_i32(f.objectives().len() as i32)?;
    for o in f.objectives() {
        out.write_f32(*o)?;
    }
    out.write_bool(f.is_maximizing())?;
    Ok(())
}

fn read_multi<R: Read + ?Sized>(
    prototype: &MultiObjectiveFitness,
    input: &mut R,
) -> Result<MultiObjectiveFitness, CodecError> {
    let n = input.read_i32()?;
    if n < 0 || n as usize != prototype.objectives().len() {
        return Err(CodecError::Malformed(format!(
            "fitness has {n} objectives, species expects {}",
            prototype.objectives().len()
        )));
    }
    let mut objectives = Vec::with_capacity(n as usize);
    for _ in 0..n {
        objectives.push(input.read_f32()?);
    }
    let maximize = input.read_bool()?;
    let mut fitness = MultiObjectiveFitness::new(prototype.bounds().clone(), maximize);
    fitness.set_objectives(objectives);
    Ok(fitness)
}

/// Read a fitness of the prototype's variant
pub fn read_fitness<R: Read + ?Sized>(prototype: &Fitness, input: &mut R) -> Result<Fitness, CodecError> {
    let tag = input.read_u8()?;
    let expected = fitness_tag(prototype);
    if tag != expected {
        return Err(CodecError::Malformed(format!(
            "fitness variant mismatch: stream has tag {tag}, species expects {} (tag {expected})",
            prototype.kind()
        )));
    }
    match prototype {
        Fitness::Scalar(_) => Ok(Fitness::Scalar(input.read_f64()?)),
        Fitness::Multi(p) => Ok(Fitness::Multi(read_multi(p, input)?)),
        Fitness::Spea2(p) => {
            let base = read_multi(&p.base, input)?;
            let mut f = Spea2Fitness::new(base);
            f.spea2_fitness = input.read_f64()?;
            f.strength = input.read_f64()?;
            f.kth_nn_distance = input.read_f64()?;
            Ok(Fitness::Spea2(f))
        }
    }
}

/// Write an individual: evaluated flag, fitness, genotype
pub fn write_individual<W: Write + ?Sized>(ind: &Individual, out: &mut W) -> Result<(), CodecError> {
    out.write_bool(ind.evaluated)?;
    write_fitness(&ind.fitness, out)?;
    write_genome(&ind.genome, out)?;
    Ok(())
}

/// Read an individual against the species prototypes
pub fn read_individual<R: Read + ?Sized>(
    species: &Species,
    input: &mut R,
) -> Result<Individual, CodecError> {
    let evaluated = input.read_bool()?;
    let fitness = read_fitness(&species.fitness_prototype, input)?;
    let genome = read_genome(&species.genome_prototype, input)?;
    Ok(Individual {
        genome,
        fitness,
        evaluated,
        species: species.id,
    })
}

fn genome_to_tokens(genome: &Genome) -> String {
    let mut s = String::new();
    match genome {
        Genome::IntVector(v) => {
            s.push_str(&text::encode_i32(v.len() as i32));
            for g in v {
                s.push(' ');
                s.push_str(&text::encode_i32(*g));
            }
        }
        Genome::LongVector(v) => {
            s.push_str(&text::encode_i32(v.len() as i32));
            for g in v {
                s.push(' ');
                s.push_str(&text::encode_i64(*g));
            }
        }
        Genome::FloatVector(v) => {
            s.push_str(&text::encode_i32(v.len() as i32));
            for g in v {
                s.push(' ');
                s.push_str(&text::encode_f64(*g));
            }
        }
        Genome::BitVector(v) => {
            s.push_str(&text::encode_i32(v.len() as i32));
            for g in v {
                s.push(' ');
                s.push_str(&text::encode_bool(*g));
            }
        }
        Genome::Tree(t) => {
            s.push_str(&text::encode_i32(t.size() as i32));
            tree_to_tokens(t, &mut s);
        }
    }
    s
}

fn tree_to_tokens(node: &TreeNode, out: &mut String) {
    out.push(' ');
    out.push_str(&text::encode_i32(node.symbol));
    out.push(' ');
    out.push_str(&text::encode_i32(node.children.len() as i32));
    for child in &node.children {
        tree_to_tokens(child, out);
    }
}

fn fitness_to_tokens(fitness: &Fitness) -> String {
    let kind = fitness.kind();
    match fitness {
        Fitness::Scalar(v) => format!("{kind} {}", text::encode_f64(*v)),
        Fitness::Multi(f) => format!("{kind} {}", multi_to_tokens(f)),
        Fitness::Spea2(f) => format!(
            "{kind} {} {} {} {}",
            multi_to_tokens(&f.base),
            text::encode_f64(f.spea2_fitness),
            text::encode_f64(f.strength),
            text::encode_f64(f.kth_nn_distance)
        ),
    }
}

fn multi_to_tokens(f: &MultiObjectiveFitness) -> String {
    let mut s = text::encode_i32(f.objectives().len() as i32);
    for o in f.objectives() {
        s.push(' ');
        s.push_str(&text::encode_f32(*o));
    }
    s.push(' ');
    s.push_str(&text::encode_bool(f.is_maximizing()));
    s
}

/// Render an individual for a human-inspectable population file
///
/// Three lines: the evaluated flag, the fitness (kind word plus tokens),
/// and the genome (kind word, length, then the elements).
pub fn individual_to_text(ind: &Individual) -> String {
    format!(
        "Evaluated: {}\nFitness: {}\nGenome: {} {}\n",
        text::encode_bool(ind.evaluated),
        fitness_to_tokens(&ind.fitness),
        ind.genome.kind(),
        genome_to_tokens(&ind.genome),
    )
}

fn multi_from_tokens(
    prototype: &MultiObjectiveFitness,
    dec: &mut TextDecoder<'_>,
) -> Result<MultiObjectiveFitness, CodecError> {
    let n = dec.decode_i32()?;
    if n < 0 || n as usize != prototype.objectives().len() {
        return Err(CodecError::Malformed(format!(
            "fitness has {n} objectives, species expects {}",
            prototype.objectives().len()
        )));
    }
    let mut objectives = Vec::with_capacity(n as usize);
    for _ in 0..n {
        objectives.push(dec.decode_f32()?);
    }
    let maximize = dec.decode_bool()?;
    let mut fitness = MultiObjectiveFitness::new(prototype.bounds().clone(), maximize);
    fitness.set_objectives(objectives);
    Ok(fitness)
}

/// Parse an individual rendered by [`individual_to_text`]
pub fn individual_from_text(species: &Species, input: &str) -> Result<Individual, CodecError> {
    let mut dec = TextDecoder::new(input);
    dec.expect_word("Evaluated:")?;
    let evaluated = dec.decode_bool()?;

    dec.expect_word("Fitness:")?;
    let kind = dec.next_word()?;
    if kind != species.fitness_prototype.kind() {
        return Err(CodecError::WrongToken {
            expected: "fitness kind",
            found: kind.to_string(),
        });
    }
    let fitness = match &species.fitness_prototype {
        Fitness::Scalar(_) => Fitness::Scalar(dec.decode_f64()?),
        Fitness::Multi(p) => Fitness::Multi(multi_from_tokens(p, &mut dec)?),
        Fitness::Spea2(p) => {
            let base = multi_from_tokens(&p.base, &mut dec)?;
            let mut f = Spea2Fitness::new(base);
            f.spea2_fitness = dec.decode_f64()?;
            f.strength = dec.decode_f64()?;
            f.kth_nn_distance = dec.decode_f64()?;
            Fitness::Spea2(f)
        }
    };

    dec.expect_word("Genome:")?;
    let kind = dec.next_word()?;
    if kind != species.genome_prototype.kind() {
        return Err(CodecError::WrongToken {
            expected: "genome kind",
            found: kind.to_string(),
        });
    }
    let len = dec.decode_i32()?;
    if len < 0 {
        return Err(CodecError::Malformed(format!("negative genome length {len}")));
    }
    let len = len as usize;
    let genome = match &species.genome_prototype {
        Genome::IntVector(_) => {
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(dec.decode_i32()?);
            }
            Genome::IntVector(v)
        }
        Genome::LongVector(_) => {
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(dec.decode_i64()?);
            }
            Genome::LongVector(v)
        }
        Genome::FloatVector(_) => {
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(dec.decode_f64()?);
            }
            Genome::FloatVector(v)
        }
        Genome::BitVector(_) => {
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(dec.decode_bool()?);
            }
            Genome::BitVector(v)
        }
        Genome::Tree(_) => Genome::Tree(tree_from_tokens(&mut dec, len)?),
    };

    Ok(Individual {
        genome,
        fitness,
        evaluated,
        species: species.id,
    })
}

fn tree_from_tokens(dec: &mut TextDecoder<'_>, size_budget: usize) -> Result<TreeNode, CodecError> {
    if size_budget == 0 {
        return Err(CodecError::Malformed(
            "tree text larger than its declared size".to_string(),
        ));
    }
    let symbol = dec.decode_i32()?;
    let arity = dec.decode_i32()?;
    if arity < 0 || arity as usize >= size_budget {
        return Err(CodecError::Malformed(format!("bad tree arity {arity}")));
    }
    let mut children = Vec::with_capacity(arity as usize);
    let mut remaining = size_budget - 1;
    for _ in 0..arity {
        let child = tree_from_tokens(dec, remaining)?;
        remaining -= child.size();
        children.push(child);
    }
    Ok(TreeNode { symbol, children })
}
